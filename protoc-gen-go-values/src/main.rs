//! `protoc-gen-go-values`: runs `protoc-gen-go` and rewrites `[]*T` to `[]T` for repeated message
//! fields annotated with `(protogo_values.value_slice)`, `(protogo_values.field_opts)`, or a
//! `@nullable=false` / `@valueslice` leading comment.

use std::io::{self, Read, Write};
use std::process;

use log::error;
use protogo_values::{encode_response, error_response, Config};

fn main() {
    env_logger::init();
    if let Err(e) = faillible_main() {
        eprintln!("protoc-gen-go-values: {}", e);
        process::exit(1);
    }
}

fn faillible_main() -> io::Result<()> {
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;

    let response = match Config::from_env() {
        Ok(config) => config.run_plugin(&buf),
        Err(e) => error_response(&e),
    };
    if let Some(message) = response.error.as_deref() {
        error!("{}", message);
    }

    let out = encode_response(&response).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(&out)?;
    stdout.flush()
}
