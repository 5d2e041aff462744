//! Thin CLI entry point: reads `BASE_PATH`, runs the pipeline, logs summary row counts, and
//! writes the output tables as bincode alongside the input files.

use std::process::ExitCode;

use cairo_trace_adapter::config::Config;
use cairo_trace_adapter::{logging, pipeline};

fn main() -> ExitCode {
    logging::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "adapter failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> cairo_trace_adapter::Result<()> {
    let config = Config::from_env()?;
    let output = pipeline::run(&config.trace_path, &config.memory_path)?;

    tracing::info!(
        steps = output.state_transitions.len(),
        distinct_values = output.memory_id_to_value.len(),
        addresses = output.memory_address_to_id.len(),
        distinct_instructions = output.instructions_by_pc.pc.len(),
        "pipeline complete"
    );

    let out_dir = config.trace_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    write_bincode(&out_dir.join("state_transitions.bin"), &output.state_transitions)?;
    write_bincode(&out_dir.join("memory_id_to_value.bin"), &output.memory_id_to_value)?;
    write_bincode(&out_dir.join("memory_address_to_id.bin"), &output.memory_address_to_id)?;
    write_bincode(&out_dir.join("instructions_by_pc.bin"), &output.instructions_by_pc)?;

    Ok(())
}

fn write_bincode<T: serde::Serialize>(path: &std::path::Path, value: &T) -> cairo_trace_adapter::Result<()> {
    let bytes = bincode::serialize(value).map_err(|cause| cairo_trace_adapter::Error::Io {
        path: path.to_path_buf(),
        cause: std::io::Error::new(std::io::ErrorKind::Other, cause),
    })?;
    std::fs::write(path, bytes)
        .map_err(|cause| cairo_trace_adapter::Error::Io { path: path.to_path_buf(), cause })
}
