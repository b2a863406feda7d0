//! `multipart/form-data` bodies for uploads.
//!
//! The transport never looks inside a form: it copies `content_type()` into
//! the request headers and sends `encode()` as the body.

use uuid::Uuid;

/// A file attached to a form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PartBody {
    Text(String),
    File(FilePart),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    name: String,
    body: PartBody,
}

/// Ordered list of form fields, encoded with a random boundary.
#[derive(Debug, Clone)]
pub struct MultipartForm {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: format!("----crud-core-{}", Uuid::new_v4().simple()),
            parts: Vec::new(),
        }
    }

    pub fn text(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.parts.push(Part {
            name: name.into(),
            body: PartBody::Text(value.into()),
        });
        self
    }

    pub fn file(&mut self, name: impl Into<String>, file: FilePart) -> &mut Self {
        self.parts.push(Part {
            name: name.into(),
            body: PartBody::File(file),
        });
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Text value of the first part with this name.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find(|p| p.name == name).and_then(|p| match &p.body {
            PartBody::Text(value) => Some(value.as_str()),
            PartBody::File(_) => None,
        })
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match &part.body {
                PartBody::Text(value) => {
                    out.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", escape(&part.name))
                            .as_bytes(),
                    );
                    out.extend_from_slice(value.as_bytes());
                }
                PartBody::File(file) => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            escape(&part.name),
                            escape(&file.file_name)
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
                    out.extend_from_slice(&file.bytes);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_text_and_file_parts() {
        let mut form = MultipartForm::new();
        form.text("name", "Lamp")
            .file("image", FilePart::new("lamp.png", "image/png", vec![1, 2, 3]));
        let body = form.encode();
        let text = String::from_utf8_lossy(&body);
        let boundary = form.boundary().to_string();

        assert!(text.starts_with(&format!("--{boundary}\r\n")));
        assert!(text.contains("Content-Disposition: form-data; name=\"name\"\r\n\r\nLamp\r\n"));
        assert!(text.contains("name=\"image\"; filename=\"lamp.png\"\r\nContent-Type: image/png\r\n\r\n"));
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
        assert_eq!(form.content_type(), format!("multipart/form-data; boundary={boundary}"));
    }

    #[test]
    fn boundaries_differ_between_forms() {
        assert_ne!(MultipartForm::new().boundary(), MultipartForm::new().boundary());
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        let mut form = MultipartForm::new();
        form.text("a\"b", "x");
        let text = String::from_utf8_lossy(&form.encode()).into_owned();
        assert!(text.contains("name=\"a\\\"b\""));
        assert_eq!(form.text_value("a\"b"), Some("x"));
    }
}
