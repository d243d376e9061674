use std::path::Path;

const EXTENSION_KINDS: &[(&str, &str)] = &[
    ("js", "nodejs:default"),
    ("py", "python:default"),
    ("swift", "swift:default"),
    ("php", "php:default"),
    ("java", "java:default"),
    ("jar", "java:default"),
    ("go", "go:default"),
    ("rb", "ruby:default"),
    ("rs", "rust:default"),
    ("ts", "typescript:default"),
    ("cs", "dotnet:default"),
    ("bal", "ballerina:default"),
];

/// Maps an artifact path to the runtime kind that executes it.
pub trait KindLookup {
    fn kind_for(&self, path: &Path) -> Option<String>;
}

/// Built-in table keyed on the final file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionKinds;

impl KindLookup for ExtensionKinds {
    fn kind_for(&self, path: &Path) -> Option<String> {
        kind_for_file_extension(path).map(str::to_string)
    }
}

impl<F> KindLookup for F
where
    F: Fn(&Path) -> Option<String>,
{
    fn kind_for(&self, path: &Path) -> Option<String> {
        self(path)
    }
}

pub fn kind_for_file_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    EXTENSION_KINDS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, kind)| *kind)
}
