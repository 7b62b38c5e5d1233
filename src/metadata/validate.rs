//! Structural validation of DataCite kernel documents

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{local_name, MetadataError, ROOT_ELEMENT};
use crate::doi::Doi;

/// What validation needs to know about a document
#[derive(Debug, Default)]
struct Kernel {
    root: Option<String>,
    identifier: Option<String>,
    identifier_type: Option<String>,
    creators: usize,
    titles: usize,
    publisher: bool,
    publication_year: Option<String>,
}

/// One open element while scanning
struct Frame {
    name: String,
    text: String,
}

/// Check that `xml` is a well-formed DataCite document with all mandatory
/// kernel properties present.
pub fn validate_metadata(xml: &str) -> Result<(), MetadataError> {
    let kernel = scan(xml)?;
    check(&kernel)
}

/// [`validate_metadata`] plus the document's identifier must name `doi`
pub fn validate_metadata_for(doi: &Doi, xml: &str) -> Result<(), MetadataError> {
    let kernel = scan(xml)?;
    check(&kernel)?;

    let identifier = kernel.identifier.unwrap_or_default();
    match Doi::parse(&identifier) {
        Ok(found) if &found == doi => Ok(()),
        _ => Err(MetadataError::Invalid(format!(
            "identifier {} does not match DOI {}",
            identifier, doi
        ))),
    }
}

fn scan(xml: &str) -> Result<Kernel, MetadataError> {
    let mut reader = Reader::from_str(xml);
    let mut kernel = Kernel::default();
    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            MetadataError::Malformed(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(e) => {
                let name = open(&mut kernel, &stack, &e)?;
                stack.push(Frame {
                    name,
                    text: String::new(),
                });
            }
            Event::Empty(e) => {
                let name = open(&mut kernel, &stack, &e)?;
                close(&mut kernel, stack.len(), &name, "");
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| MetadataError::Malformed("unbalanced end tag".into()))?;
                close(&mut kernel, stack.len(), &frame.name, frame.text.trim());
            }
            Event::Text(t) => {
                if let Some(frame) = stack.last_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| MetadataError::Malformed(e.to_string()))?;
                    frame.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(MetadataError::Malformed(
            "document ends inside an open element".into(),
        ));
    }
    Ok(kernel)
}

/// Record an opening tag, returning its local name
fn open(kernel: &mut Kernel, stack: &[Frame], e: &BytesStart<'_>) -> Result<String, MetadataError> {
    let name = local_name(e.local_name().as_ref());

    if stack.is_empty() {
        if kernel.root.is_some() {
            return Err(MetadataError::Malformed("more than one root element".into()));
        }
        kernel.root = Some(name.clone());
    }

    if name == "identifier" && stack.len() == 1 {
        for attr in e.attributes() {
            let attr = attr.map_err(|e| MetadataError::Malformed(e.to_string()))?;
            if attr.key.local_name().as_ref() == b"identifierType" {
                let value = attr
                    .unescape_value()
                    .map_err(|e| MetadataError::Malformed(e.to_string()))?;
                kernel.identifier_type = Some(value.into_owned());
            }
        }
    }

    Ok(name)
}

/// Record a closed element; `depth` is the number of still-open ancestors
fn close(kernel: &mut Kernel, depth: usize, name: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    match (name, depth) {
        ("identifier", 1) => kernel.identifier = Some(text.to_string()),
        ("creatorName", _) => kernel.creators += 1,
        ("title", _) => kernel.titles += 1,
        ("publisher", 1) => kernel.publisher = true,
        ("publicationYear", 1) => kernel.publication_year = Some(text.to_string()),
        _ => {}
    }
}

fn check(kernel: &Kernel) -> Result<(), MetadataError> {
    match kernel.root.as_deref() {
        Some(ROOT_ELEMENT) => {}
        Some(other) => {
            return Err(MetadataError::Invalid(format!(
                "root element is <{}>, expected <{}>",
                other, ROOT_ELEMENT
            )))
        }
        None => return Err(MetadataError::Malformed("document is empty".into())),
    }

    if kernel.identifier.is_none() {
        return Err(MetadataError::Invalid("missing identifier".into()));
    }
    if kernel.identifier_type.as_deref() != Some("DOI") {
        return Err(MetadataError::Invalid(
            "identifier must have identifierType=\"DOI\"".into(),
        ));
    }
    if kernel.creators == 0 {
        return Err(MetadataError::Invalid("at least one creator is required".into()));
    }
    if kernel.titles == 0 {
        return Err(MetadataError::Invalid("at least one title is required".into()));
    }
    if !kernel.publisher {
        return Err(MetadataError::Invalid("missing publisher".into()));
    }

    let year = kernel.publication_year.as_deref().unwrap_or_default();
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(MetadataError::Invalid(format!(
            "publicationYear must be a four digit year, got {:?}",
            year
        )));
    }

    Ok(())
}
