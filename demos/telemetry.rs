use mathematica_mcp::{Severity, Telemetry};

fn main() {
    // Records go to stdout as JSON lines; point the exporter at a shipper to
    // reach a hosted dashboard.
    let telemetry = Telemetry::builder()
        .service_name("mathematica_mcp")
        .level(Severity::Debug)
        .exporter(std::io::stdout)
        .build();

    telemetry.info("Testing Logfire logging functionality");
    telemetry.warning("This is a warning message");
    telemetry.critical("This is a critical message");
}
