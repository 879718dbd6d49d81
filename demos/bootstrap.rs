fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = mathematica_mcp::logger()?;

    logger.debug("This is a debug message");
    logger.info("Testing Loguru logging functionality");
    logger.warning("This is a warning message");
    logger.critical("This is a critical message");

    // The shared logger is also the global dispatcher.
    tracing::error!(code = 503, "This is an error message");

    logger.flush()?;
    println!("Wrote to ./{}", mathematica_mcp::log_file_name());
    Ok(())
}
