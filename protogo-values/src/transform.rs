//! Rewrites of `protoc-gen-go` output, from pointer slices to value slices.
//!
//! For each annotated field `Name`, two line-scoped rewrites are applied:
//!
//! - the struct field `Name []*T` becomes `Name []T`, unless the line is a `//` comment;
//! - the getter `GetName() []*T` becomes `GetName() []T`, on any line.
//!
//! Declarations spanning several lines are not recognized.

use std::borrow::Cow;

use log::{debug, trace, warn};
use prost_types::compiler::{code_generator_response, CodeGeneratorResponse};
use rayon::prelude::*;
use regex::Regex;

use crate::annotations::AnnotatedFields;
use crate::{Error, Result};

/// The element type prefix `protoc-gen-go` emits for repeated message fields.
pub const POINTER_SLICE: &str = "[]*";
/// The element type prefix of a rewritten field.
pub const VALUE_SLICE: &str = "[]";

const GETTER_PREFIX: &str = "Get";
const GETTER_PARENS: &str = "()";
const LINE_COMMENT: &str = "//";

/// The compiled rewrites for a single field.
#[derive(Clone, Debug)]
struct FieldRewrite {
    field: String,
    declaration: Regex,
    pointer_getter: String,
    value_getter: String,
}

impl FieldRewrite {
    fn new(field: &str) -> Option<FieldRewrite> {
        if field.is_empty() {
            return None;
        }

        // `\b` rejects `AdminUsers` for `Users`; the mandatory blank run rejects `UsersList`.
        let declaration = format!(
            r"(?P<head>\b{}[ \t]+{})\*",
            regex::escape(field),
            regex::escape(VALUE_SLICE)
        );
        let declaration = match Regex::new(&declaration) {
            Ok(declaration) => declaration,
            Err(error) => {
                warn!("skipping field {:?}: {}", field, error);
                return None;
            }
        };

        Some(FieldRewrite {
            field: field.to_string(),
            declaration,
            pointer_getter: format!("{}{}{} {}", GETTER_PREFIX, field, GETTER_PARENS, POINTER_SLICE),
            value_getter: format!("{}{}{} {}", GETTER_PREFIX, field, GETTER_PARENS, VALUE_SLICE),
        })
    }

    /// Rewrites a single line, returning `None` if it is unchanged.
    fn rewrite_line(&self, line: &str) -> Option<String> {
        if !line.contains(self.field.as_str()) {
            return None;
        }

        let mut rewritten = None;

        if !line.trim_start().starts_with(LINE_COMMENT) {
            if let Cow::Owned(buf) = self.declaration.replace_all(line, "${head}") {
                rewritten = Some(buf);
            }
        }

        let current = rewritten.as_deref().unwrap_or(line);
        if current.contains(self.pointer_getter.as_str()) {
            rewritten = Some(current.replace(&self.pointer_getter, &self.value_getter));
        }

        rewritten
    }

    fn rewrite(&self, content: &str) -> Option<String> {
        if !content.contains(self.field.as_str()) {
            return None;
        }

        let mut changed = false;
        let lines = content
            .split('\n')
            .map(|line| match self.rewrite_line(line) {
                Some(rewritten) => {
                    trace!("{}: {:?} -> {:?}", self.field, line, rewritten);
                    changed = true;
                    rewritten
                }
                None => line.to_string(),
            })
            .collect::<Vec<_>>();

        if changed {
            Some(lines.join("\n"))
        } else {
            None
        }
    }
}

/// Applies the value-slice rewrites of a set of annotated fields to generated Go sources.
///
/// The patterns are compiled once, so a `Rewriter` should be reused across all files of a
/// response.
#[derive(Clone, Debug)]
pub struct Rewriter {
    fields: Vec<FieldRewrite>,
}

impl Rewriter {
    pub fn new(fields: &AnnotatedFields) -> Rewriter {
        Rewriter {
            fields: fields.iter().filter_map(FieldRewrite::new).collect(),
        }
    }

    /// Returns `content` with every annotated field declaration and getter rewritten.
    ///
    /// Rewriting already rewritten content is a no-op.
    pub fn rewrite(&self, content: &str) -> String {
        let mut content = content.to_string();
        for field in &self.fields {
            if let Some(rewritten) = field.rewrite(&content) {
                content = rewritten;
            }
        }
        content
    }

    /// Rewrites the content of each file in place. File names, insertion points and the number
    /// of files are never changed; files without content are skipped.
    ///
    /// Files are processed in parallel.
    pub fn apply(&self, files: &mut [code_generator_response::File]) {
        if self.fields.is_empty() {
            return;
        }

        files.par_iter_mut().for_each(|file| {
            if let Some(content) = file.content.as_mut() {
                let rewritten = self.rewrite(content);
                if rewritten != *content {
                    debug!("rewrote value slices in {:?}", file.name.as_deref());
                    *content = rewritten;
                }
            }
        });
    }
}

/// Rewrites a single field in `content`.
pub fn rewrite_field(content: &str, field: &str) -> String {
    FieldRewrite::new(field)
        .and_then(|rewrite| rewrite.rewrite(content))
        .unwrap_or_else(|| content.to_string())
}

/// Rewrites every file of `response` for the annotated `fields`.
///
/// Fails if either argument is `None`. An empty field set or a response without files is a no-op.
pub fn apply_transformations(
    response: Option<&mut CodeGeneratorResponse>,
    fields: Option<&AnnotatedFields>,
) -> Result<()> {
    let response = response.ok_or_else(|| Error::invalid_input("response cannot be None"))?;
    let fields = fields.ok_or_else(|| Error::invalid_input("fields cannot be None"))?;

    Rewriter::new(fields).apply(&mut response.file);
    Ok(())
}
