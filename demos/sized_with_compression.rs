use mathematica_mcp::{Compression, FileSink, Logger, RotationSize, Severity};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = Logger::builder()
        .remove_default()
        .sink(
            FileSink::new("./logs/sized.log")
                .rotation(RotationSize::KB(256))
                .max_keep_files(5)
                .compression(Compression::Gzip)
                .file_mode(0o640)
                .level(Severity::Info),
        )
        .build()?;

    // Enough to roll over a handful of times
    for i in 1..=10_000 {
        logger.info(&format!(
            "Log entry #{i}: This is a sample log message that will contribute to file size"
        ));
    }
    logger.flush()?;

    for (id, sink) in logger.sinks().iter().map(|s| (s.id, &s.kind)) {
        println!("sink {id}: {sink:?}");
    }
    Ok(())
}
