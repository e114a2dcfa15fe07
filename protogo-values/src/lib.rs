#![doc(html_root_url = "https://docs.rs/protogo-values/0.1.0")]

//! `protogo-values` post-processes the output of `protoc-gen-go`, turning repeated message
//! fields of the form `[]*T` into value slices, `[]T`, for the fields a schema author has
//! annotated.
//!
//! ## Annotating fields
//!
//! Import `protogo_values/options.proto` (shipped in this crate's `proto` directory) and mark the
//! fields:
//!
//! ```proto
//! syntax = "proto3";
//!
//! import "protogo_values/options.proto";
//!
//! message Team {
//!   repeated User members = 1 [(protogo_values.value_slice) = true];
//!   repeated User alumni = 2 [(protogo_values.field_opts) = { value_slice: true }];
//!
//!   // Kept by value. @valueslice
//!   repeated User guests = 3;
//! }
//! ```
//!
//! The generated Go code then reads `Members []User` and `func (x *Team) GetMembers() []User`.
//! Only repeated message fields of top-level messages are rewritten.
//!
//! ## Running
//!
//! The `protoc-gen-go-values` binary is a drop-in replacement for `protoc-gen-go`:
//!
//! ```bash
//! protoc --go-values_out=. --go-values_opt=paths=source_relative team.proto
//! ```
//!
//! It forwards the request unchanged to `protoc-gen-go` (or the program named by
//! `PROTOC_GEN_GO`) and rewrites the files it returns.

use log::{debug, warn};
use prost::Message;
use prost_types::compiler::CodeGeneratorResponse;

pub mod annotations;
pub mod descriptor;
mod error;
pub mod generator;
pub mod ident;
pub mod transform;

pub use crate::annotations::AnnotatedFields;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::generator::{BaseGenerator, ProtocGenGo};
pub use crate::transform::Rewriter;

use crate::descriptor::CodeGeneratorRequest;

/// Configuration options for the plugin.
pub struct Config {
    base_generator: Box<dyn BaseGenerator>,
}

impl Config {
    /// Creates a new configuration which runs `protoc-gen-go` from `PATH`.
    pub fn new() -> Config {
        Config::default()
    }

    /// Creates a new configuration whose base generator is read from the environment.
    ///
    /// See [`ProtocGenGo::from_env`].
    pub fn from_env() -> Result<Config> {
        let mut config = Config::new();
        config.base_generator(ProtocGenGo::from_env()?);
        Ok(config)
    }

    /// Replaces the generator whose output is rewritten.
    pub fn base_generator<G>(&mut self, base_generator: G) -> &mut Self
    where
        G: BaseGenerator + 'static,
    {
        self.base_generator = Box::new(base_generator);
        self
    }

    /// Processes an encoded `CodeGeneratorRequest`.
    ///
    /// The request bytes are handed unchanged to the base generator, and every file of its
    /// response is rewritten for the fields annotated in the request. If the base generator
    /// reports an error in its response, that response is returned as is.
    pub fn process(&self, request: &[u8]) -> Result<CodeGeneratorResponse> {
        let parsed = CodeGeneratorRequest::from_bytes(request)?;
        debug!(
            "request: {} files to generate, {} proto files",
            parsed.file_to_generate.len(),
            parsed.proto_file.len()
        );

        let mut response = self.base_generator.generate(request)?;
        if let Some(error) = response.error.as_deref() {
            warn!("base generator reported an error: {}", error);
            return Ok(response);
        }

        let fields = annotations::find_annotated_fields(Some(&parsed))?;
        debug!("annotated fields: {:?}", fields.iter().collect::<Vec<_>>());

        transform::apply_transformations(Some(&mut response), Some(&fields))?;
        Ok(response)
    }

    /// Processes an encoded `CodeGeneratorRequest`, reporting any failure through the
    /// response's `error` field as the plugin protocol expects.
    pub fn run_plugin(&self, request: &[u8]) -> CodeGeneratorResponse {
        match self.process(request) {
            Ok(response) => response,
            Err(error) => error_response(&error),
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            base_generator: Box::new(ProtocGenGo::default()),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config").finish_non_exhaustive()
    }
}

/// Builds a response which carries only an error message.
pub fn error_response(error: &Error) -> CodeGeneratorResponse {
    CodeGeneratorResponse {
        error: Some(error.to_string()),
        ..Default::default()
    }
}

/// Encodes a response for writing to stdout.
pub fn encode_response(response: &CodeGeneratorResponse) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(response.encoded_len());
    response.encode(&mut buf)?;
    Ok(buf)
}
