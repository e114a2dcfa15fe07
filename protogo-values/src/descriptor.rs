//! A partial view of
//! [plugin.proto](https://github.com/protocolbuffers/protobuf/blob/main/src/google/protobuf/compiler/plugin.proto)
//! and [descriptor.proto](https://github.com/protocolbuffers/protobuf/blob/main/src/google/protobuf/descriptor.proto).
//!
//! Only the fields needed to find annotated fields are declared; everything else is skipped while
//! decoding. `FieldOptions` declares the `protogo_values` extensions as ordinary fields at their
//! extension numbers so they survive decoding instead of being dropped as unknown fields.

use prost::Message;
pub use prost_types::field_descriptor_proto::{Label, Type};

/// Extension number of the `(protogo_values.value_slice)` shorthand field option.
pub const VALUE_SLICE_EXTENSION: u32 = 50001;

/// Extension number of the `(protogo_values.field_opts)` structured field option.
pub const FIELD_OPTS_EXTENSION: u32 = 50002;

/// An encoded `CodeGeneratorRequest` written to the plugin's stdin by `protoc`.
#[derive(Clone, PartialEq, Message)]
pub struct CodeGeneratorRequest {
    /// The .proto files that were explicitly listed on the command-line.
    #[prost(string, repeated, tag = "1")]
    pub file_to_generate: Vec<String>,
    /// The generator parameter passed on the command-line.
    #[prost(string, optional, tag = "2")]
    pub parameter: Option<String>,
    /// FileDescriptorProtos for all files in files_to_generate and everything
    /// they import, in topological order.
    #[prost(message, repeated, tag = "15")]
    pub proto_file: Vec<FileDescriptorProto>,
}

/// Describes a complete .proto file.
#[derive(Clone, PartialEq, Message)]
pub struct FileDescriptorProto {
    /// file name, relative to root of source tree
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    /// e.g. "foo", "foo.bar", etc.
    #[prost(string, optional, tag = "2")]
    pub package: Option<String>,
    /// All top-level definitions in this file.
    #[prost(message, repeated, tag = "4")]
    pub message_type: Vec<DescriptorProto>,
    /// Original source locations, present when `protoc` passes `--include_source_info`
    /// (always the case for plugins).
    #[prost(message, optional, tag = "9")]
    pub source_code_info: Option<SourceCodeInfo>,
}

/// Describes a message type.
#[derive(Clone, PartialEq, Message)]
pub struct DescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(message, repeated, tag = "2")]
    pub field: Vec<FieldDescriptorProto>,
    #[prost(message, repeated, tag = "3")]
    pub nested_type: Vec<DescriptorProto>,
}

/// Describes a field within a message.
#[derive(Clone, PartialEq, Message)]
pub struct FieldDescriptorProto {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(int32, optional, tag = "3")]
    pub number: Option<i32>,
    #[prost(enumeration = "Label", optional, tag = "4")]
    pub label: Option<i32>,
    /// If type_name is set, this need not be set.  If both this and type_name
    /// are set, this must be one of TYPE_ENUM, TYPE_MESSAGE or TYPE_GROUP.
    #[prost(enumeration = "Type", optional, tag = "5")]
    pub r#type: Option<i32>,
    /// For message and enum types, this is the name of the type.
    #[prost(string, optional, tag = "6")]
    pub type_name: Option<String>,
    #[prost(message, optional, tag = "8")]
    pub options: Option<FieldOptions>,
}

/// `google.protobuf.FieldOptions`, reduced to the `protogo_values` extensions.
#[derive(Clone, PartialEq, Message)]
pub struct FieldOptions {
    /// `(protogo_values.value_slice)`: the shorthand form. Takes precedence over `field_opts`.
    #[prost(bool, optional, tag = "50001")]
    pub value_slice: Option<bool>,
    /// `(protogo_values.field_opts)`: the structured form.
    #[prost(message, optional, tag = "50002")]
    pub field_opts: Option<ValueSliceOptions>,
}

/// `protogo_values.FieldOptions`, the payload of the structured extension.
#[derive(Clone, PartialEq, Message)]
pub struct ValueSliceOptions {
    #[prost(bool, optional, tag = "1")]
    pub value_slice: Option<bool>,
}

/// Encapsulates information about the original source file from which a
/// FileDescriptorProto was generated.
#[derive(Clone, PartialEq, Message)]
pub struct SourceCodeInfo {
    #[prost(message, repeated, tag = "1")]
    pub location: Vec<source_code_info::Location>,
}

pub mod source_code_info {
    use prost::Message;

    #[derive(Clone, PartialEq, Message)]
    pub struct Location {
        /// Identifies which part of the FileDescriptorProto was defined at this
        /// location, as a sequence of field numbers and indices.
        #[prost(int32, repeated, tag = "1")]
        pub path: Vec<i32>,
        /// `[start line, start column, end line, end column]`, zero-based.
        #[prost(int32, repeated, tag = "2")]
        pub span: Vec<i32>,
        #[prost(string, optional, tag = "3")]
        pub leading_comments: Option<String>,
        #[prost(string, optional, tag = "4")]
        pub trailing_comments: Option<String>,
        #[prost(string, repeated, tag = "6")]
        pub leading_detached_comments: Vec<String>,
    }
}

impl CodeGeneratorRequest {
    /// Decodes the request view from the raw bytes `protoc` wrote to stdin.
    pub fn from_bytes(buf: &[u8]) -> crate::Result<CodeGeneratorRequest> {
        CodeGeneratorRequest::decode(buf).map_err(crate::Error::MalformedRequest)
    }
}
