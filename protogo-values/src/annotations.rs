//! Discovery of the repeated message fields that should become value slices.
//!
//! A field is annotated by, in order of precedence:
//!
//!   1. the shorthand extension, `[(protogo_values.value_slice) = true]`;
//!   2. the structured extension, `[(protogo_values.field_opts) = { value_slice: true }]`;
//!   3. a `@nullable=false` or `@valueslice` marker in the field's leading comment.
//!
//! Only fields of top-level messages are considered. Fields of nested messages are not visited.

use std::collections::btree_set::{self, BTreeSet};

use log::debug;

use crate::descriptor::{
    CodeGeneratorRequest, DescriptorProto, FieldDescriptorProto, FileDescriptorProto, Label,
    SourceCodeInfo, Type,
};
use crate::ident::to_go_field_name;
use crate::{Error, Result};

/// Leading-comment markers which annotate a field when no extension is present.
pub const COMMENT_MARKERS: [&str; 2] = ["@nullable=false", "@valueslice"];

// Field numbers within `FileDescriptorProto` and `DescriptorProto`, used to build
// `SourceCodeInfo` location paths.
const MESSAGE_TYPE: i32 = 4;
const FIELD: i32 = 2;

/// The set of Go field names to convert from `[]*T` to `[]T`.
///
/// Inserting a name twice has no effect. Iteration is in sorted order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnnotatedFields {
    fields: BTreeSet<String>,
}

impl AnnotatedFields {
    pub fn new() -> AnnotatedFields {
        AnnotatedFields::default()
    }

    /// Resolves the annotated fields of every top-level message in `files`.
    pub fn from_files(files: &[FileDescriptorProto]) -> AnnotatedFields {
        let mut fields = AnnotatedFields::new();
        for file in files {
            fields.push_file(file);
        }
        fields
    }

    /// Adds a Go field name, returning `false` if it was already present.
    pub fn insert(&mut self, field: impl Into<String>) -> bool {
        self.fields.insert(field.into())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.fields.iter(),
        }
    }

    fn push_file(&mut self, file: &FileDescriptorProto) {
        debug!("file: {:?}", file.name());

        let comments = LeadingComments::new(file.source_code_info.as_ref());
        let mut path = vec![MESSAGE_TYPE];
        for (idx, message) in file.message_type.iter().enumerate() {
            path.push(idx as i32);
            self.push_message(message, &comments, &mut path);
            path.pop();
        }
    }

    fn push_message(
        &mut self,
        message: &DescriptorProto,
        comments: &LeadingComments<'_>,
        path: &mut Vec<i32>,
    ) {
        debug!("  message: {:?}", message.name());

        path.push(FIELD);
        for (idx, field) in message.field.iter().enumerate() {
            path.push(idx as i32);
            if is_eligible(field) && is_annotated(field, comments.get(path)) {
                let name = to_go_field_name(field.name());
                debug!("    field: {:?} -> {}", field.name(), name);
                self.insert(name);
            }
            path.pop();
        }
        path.pop();
    }
}

impl<'a> IntoIterator for &'a AnnotatedFields {
    type Item = &'a str;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl FromIterator<String> for AnnotatedFields {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> AnnotatedFields {
        AnnotatedFields {
            fields: iter.into_iter().collect(),
        }
    }
}

impl Extend<String> for AnnotatedFields {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.fields.extend(iter);
    }
}

/// Iterator over the names in an [`AnnotatedFields`], in sorted order.
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    inner: btree_set::Iter<'a, String>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.inner.next().map(String::as_str)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Resolves the annotated fields of a request.
///
/// Fails only if `request` is `None`; a request without files or messages yields an empty set.
pub fn find_annotated_fields(request: Option<&CodeGeneratorRequest>) -> Result<AnnotatedFields> {
    let request = request.ok_or_else(|| Error::invalid_input("request cannot be None"))?;
    Ok(AnnotatedFields::from_files(&request.proto_file))
}

/// Returns `true` if the field is a repeated message field, the only kind `protoc-gen-go` emits
/// as `[]*T`.
pub fn is_eligible(field: &FieldDescriptorProto) -> bool {
    field.label() == Label::Repeated && field.r#type() == Type::Message
}

/// Returns the explicit value-slice setting from the field's extension options, if any.
///
/// The shorthand extension wins when both are present. A structured extension without its
/// `value_slice` flag set counts as absent.
pub fn value_slice_option(field: &FieldDescriptorProto) -> Option<bool> {
    let options = field.options.as_ref()?;
    options.value_slice.or_else(|| {
        options
            .field_opts
            .as_ref()
            .and_then(|field_opts| field_opts.value_slice)
    })
}

/// Returns `true` if `comments` contains one of the [`COMMENT_MARKERS`]. Matching is exact and
/// case-sensitive.
pub fn has_value_slice_marker(comments: &str) -> bool {
    COMMENT_MARKERS
        .iter()
        .any(|marker| comments.contains(marker))
}

fn is_annotated(field: &FieldDescriptorProto, leading_comments: Option<&str>) -> bool {
    match value_slice_option(field) {
        Some(value_slice) => value_slice,
        None => leading_comments.map_or(false, has_value_slice_marker),
    }
}

/// Leading comments of a file, searchable by location path.
struct LeadingComments<'a> {
    locations: Vec<(&'a [i32], &'a str)>,
}

impl<'a> LeadingComments<'a> {
    fn new(source_info: Option<&'a SourceCodeInfo>) -> LeadingComments<'a> {
        let mut locations = source_info
            .into_iter()
            .flat_map(|source_info| &source_info.location)
            .filter_map(|location| {
                location
                    .leading_comments
                    .as_deref()
                    .map(|comments| (&location.path[..], comments))
            })
            .collect::<Vec<_>>();
        locations.sort_by(|a, b| a.0.cmp(b.0));
        LeadingComments { locations }
    }

    fn get(&self, path: &[i32]) -> Option<&'a str> {
        self.locations
            .binary_search_by(|(location, _)| (*location).cmp(path))
            .ok()
            .map(|idx| self.locations[idx].1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::source_code_info::Location;
    use crate::descriptor::{FieldOptions, ValueSliceOptions};

    fn field(name: &str, label: Label, ty: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(1),
            label: Some(label as i32),
            r#type: Some(ty as i32),
            type_name: match ty {
                Type::Message => Some(".test.User".to_string()),
                _ => None,
            },
            options: None,
        }
    }

    fn repeated_message(name: &str) -> FieldDescriptorProto {
        field(name, Label::Repeated, Type::Message)
    }

    fn with_options(
        mut field: FieldDescriptorProto,
        value_slice: Option<bool>,
        field_opts: Option<Option<bool>>,
    ) -> FieldDescriptorProto {
        field.options = Some(FieldOptions {
            value_slice,
            field_opts: field_opts.map(|value_slice| ValueSliceOptions { value_slice }),
        });
        field
    }

    fn message(name: &str, field: Vec<FieldDescriptorProto>) -> DescriptorProto {
        DescriptorProto {
            name: Some(name.to_string()),
            field,
            nested_type: Vec::new(),
        }
    }

    fn file(message_type: Vec<DescriptorProto>) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("test.proto".to_string()),
            package: Some("test".to_string()),
            message_type,
            source_code_info: None,
        }
    }

    fn location(path: &[i32], leading_comments: &str) -> Location {
        Location {
            path: path.to_vec(),
            leading_comments: Some(leading_comments.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_value_slice_option() {
        let cases = [
            ("no options", repeated_message("test_field"), None),
            (
                "empty options",
                with_options(repeated_message("test_field"), None, None),
                None,
            ),
            (
                "value_slice true",
                with_options(repeated_message("test_field"), Some(true), None),
                Some(true),
            ),
            (
                "value_slice false",
                with_options(repeated_message("test_field"), Some(false), None),
                Some(false),
            ),
            (
                "field_opts true",
                with_options(repeated_message("test_field"), None, Some(Some(true))),
                Some(true),
            ),
            (
                "field_opts false",
                with_options(repeated_message("test_field"), None, Some(Some(false))),
                Some(false),
            ),
            (
                "field_opts without value_slice",
                with_options(repeated_message("test_field"), None, Some(None)),
                None,
            ),
            (
                "shorthand true wins over field_opts false",
                with_options(repeated_message("test_field"), Some(true), Some(Some(false))),
                Some(true),
            ),
            (
                "shorthand false wins over field_opts true",
                with_options(repeated_message("test_field"), Some(false), Some(Some(true))),
                Some(false),
            ),
        ];

        for (name, field, expected) in cases {
            assert_eq!(expected, value_slice_option(&field), "{}", name);
        }
    }

    #[test]
    fn test_has_value_slice_marker() {
        assert!(has_value_slice_marker("@nullable=false"));
        assert!(has_value_slice_marker("@valueslice"));
        assert!(has_value_slice_marker(" List of users @valueslice\n"));
        assert!(has_value_slice_marker(" Users.\n @nullable=false please\n"));

        assert!(!has_value_slice_marker(""));
        assert!(!has_value_slice_marker(" List of users\n"));
        assert!(!has_value_slice_marker("@ValueSlice"));
        assert!(!has_value_slice_marker("@nullable = false"));
        assert!(!has_value_slice_marker("@nullable=true"));
        assert!(!has_value_slice_marker("@NULLABLE=FALSE"));
        assert!(!has_value_slice_marker("@value_slice"));
    }

    #[test]
    fn test_is_eligible() {
        assert!(is_eligible(&repeated_message("users")));
        assert!(!is_eligible(&field("tags", Label::Repeated, Type::String)));
        assert!(!is_eligible(&field("single_user", Label::Optional, Type::Message)));
        assert!(!is_eligible(&field("required_user", Label::Required, Type::Message)));
        assert!(!is_eligible(&field("ids", Label::Repeated, Type::Int64)));
        assert!(!is_eligible(&field("kinds", Label::Repeated, Type::Enum)));
        assert!(!is_eligible(&field("groups", Label::Repeated, Type::Group)));
    }

    #[test]
    fn test_field_options() {
        let files = vec![file(vec![message(
            "FieldOptionsTest",
            vec![
                with_options(repeated_message("users_with_option"), Some(true), None),
                with_options(
                    repeated_message("products_with_struct_option"),
                    None,
                    Some(Some(true)),
                ),
                repeated_message("users_without_option"),
                with_options(repeated_message("products_explicit_false"), Some(false), None),
                with_options(field("tags", Label::Repeated, Type::String), Some(true), None),
                with_options(
                    field("single_user", Label::Optional, Type::Message),
                    Some(true),
                    None,
                ),
            ],
        )])];

        let fields = AnnotatedFields::from_files(&files);
        assert_eq!(
            vec!["ProductsWithStructOption", "UsersWithOption"],
            fields.iter().collect::<Vec<_>>()
        );
        assert!(!fields.contains("UsersWithoutOption"));
        assert!(!fields.contains("ProductsExplicitFalse"));
        assert!(!fields.contains("Tags"));
        assert!(!fields.contains("SingleUser"));
    }

    #[test]
    fn test_comment_markers() {
        let mut test_file = file(vec![
            message(
                "TestMessage",
                vec![
                    repeated_message("users"),
                    repeated_message("admins"),
                    repeated_message("products"),
                    field("tags", Label::Repeated, Type::String),
                ],
            ),
            message("Inventory", vec![repeated_message("items")]),
        ]);
        test_file.source_code_info = Some(SourceCodeInfo {
            location: vec![
                location(&[4, 1, 2, 0], " @valueslice\n"),
                location(&[4, 0, 2, 3], " @valueslice\n"),
                location(&[4, 0, 2, 0], " Users of the system.\n @nullable=false\n"),
                location(&[4, 0, 2, 1], " Admins, kept as pointers.\n"),
                location(&[4, 0, 2, 2], " @valueslice\n"),
                location(&[4, 0], " @valueslice\n"),
            ],
        });

        let fields = AnnotatedFields::from_files(&[test_file]);
        assert_eq!(
            vec!["Items", "Products", "Users"],
            fields.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_extension_overrides_comment() {
        let mut test_file = file(vec![message(
            "TestMessage",
            vec![
                with_options(repeated_message("users"), Some(false), None),
                with_options(repeated_message("admins"), None, Some(None)),
            ],
        )]);
        test_file.source_code_info = Some(SourceCodeInfo {
            location: vec![
                location(&[4, 0, 2, 0], " @valueslice\n"),
                location(&[4, 0, 2, 1], " @valueslice\n"),
            ],
        });

        let fields = AnnotatedFields::from_files(&[test_file]);
        assert!(!fields.contains("Users"));
        // An unset structured flag falls through to the comment.
        assert!(fields.contains("Admins"));
    }

    #[test]
    fn test_fields_without_options_not_annotated() {
        let files = vec![file(vec![
            message("TestResponse", vec![repeated_message("results")]),
            message(
                "TestResult",
                vec![
                    field("name", Label::Optional, Type::String),
                    field("passed", Label::Optional, Type::Bool),
                ],
            ),
        ])];

        let fields = AnnotatedFields::from_files(&files);
        assert!(!fields.contains("Results"));
        assert!(fields.is_empty());
    }

    #[test]
    fn test_nested_messages_not_visited() {
        let mut outer = message(
            "OuterMessage",
            vec![with_options(repeated_message("outer_field"), Some(true), None)],
        );
        outer.nested_type.push(message(
            "InnerMessage",
            vec![with_options(repeated_message("inner_field"), Some(true), None)],
        ));

        let fields = AnnotatedFields::from_files(&[file(vec![outer])]);
        assert!(fields.contains("OuterField"));
        assert!(!fields.contains("InnerField"));
    }

    #[test]
    fn test_duplicate_names_across_files() {
        let files = vec![
            file(vec![message(
                "A",
                vec![with_options(repeated_message("users"), Some(true), None)],
            )]),
            file(vec![message(
                "B",
                vec![with_options(repeated_message("users"), Some(true), None)],
            )]),
        ];

        let fields = AnnotatedFields::from_files(&files);
        assert_eq!(1, fields.len());
        assert!(fields.contains("Users"));
    }

    #[test]
    fn test_empty() {
        assert!(AnnotatedFields::from_files(&[]).is_empty());
        assert!(AnnotatedFields::from_files(&[file(Vec::new())]).is_empty());
        assert!(AnnotatedFields::from_files(&[file(vec![message("Empty", Vec::new())])]).is_empty());

        let request = CodeGeneratorRequest::default();
        assert!(find_annotated_fields(Some(&request)).unwrap().is_empty());
    }

    #[test]
    fn test_find_annotated_fields_none() {
        let err = find_annotated_fields(None).unwrap_err();
        assert_eq!(crate::ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut fields = AnnotatedFields::new();
        assert!(fields.insert("Users"));
        assert!(!fields.insert("Users"));
        assert_eq!(1, fields.len());
        assert_eq!(
            fields,
            vec!["Users".to_string(), "Users".to_string()]
                .into_iter()
                .collect::<AnnotatedFields>()
        );
    }
}
