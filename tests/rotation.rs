use {
    mathematica_mcp::{Compression, FileSink, Logger, RotationSize},
    std::{fs, io::Read},
};

#[test]
fn lines_written_before_rotation_stay_in_the_prior_segment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mathematica_mcp.log");
    let logger = Logger::builder()
        .remove_default()
        .sink(FileSink::new(&path).rotation(RotationSize::KB(1)))
        .build()
        .unwrap();

    let mut written = 0;
    while !dir.path().join("mathematica_mcp.log.1").exists() {
        logger.info(&format!("entry #{written}: filling the active file up to its threshold"));
        written += 1;
        assert!(written < 1_000, "the file never rotated");
    }
    logger.info("first line of the new segment");
    logger.flush().unwrap();

    let segment = fs::read_to_string(dir.path().join("mathematica_mcp.log.1")).unwrap();
    assert!(segment.len() as u64 >= RotationSize::KB(1).bytes());
    for i in 0..written {
        assert!(segment.contains(&format!("entry #{i}:")), "entry #{i} missing");
    }

    let active = fs::read_to_string(&path).unwrap();
    assert_eq!(active.lines().count(), 1);
    assert!(active.contains("first line of the new segment"));
}

#[test]
fn retention_and_compression_apply_to_logger_segments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let logger = Logger::builder()
        .remove_default()
        .sink(
            FileSink::new(&path)
                .rotation(RotationSize::Bytes(64))
                .compression(Compression::Gzip)
                .max_keep_files(2),
        )
        .build()
        .unwrap();

    for i in 0..10 {
        logger.error(&format!("record {i} is long enough to rotate the file on its own"));
        logger.flush().unwrap();
    }

    let mut names = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["app.log", "app.log.1.gz", "app.log.2.gz"]);

    let mut newest = String::new();
    flate2::read::GzDecoder::new(fs::File::open(dir.path().join("app.log.1.gz")).unwrap())
        .read_to_string(&mut newest)
        .unwrap();
    assert!(newest.contains("record 9 "));
}
