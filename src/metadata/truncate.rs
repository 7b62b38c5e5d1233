//! Description truncation for oversized metadata
//!
//! The authority rejects documents above its size limit with HTTP 413. The
//! bulk of an oversized document is almost always free text in
//! `<description>` (download descriptions list every constituent dataset),
//! so those are cut down and point at the landing page for the rest.

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};

use super::{local_name, MetadataError, ROOT_ELEMENT};
use crate::doi::Doi;

/// Element currently being buffered for rewriting
enum Capture {
    Identifier,
    Description,
}

/// Shortens `<description>` elements of a DataCite document.
#[derive(Debug, Clone)]
pub struct MetadataTruncator {
    max_description_chars: usize,
}

impl Default for MetadataTruncator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_DESCRIPTION_CHARS)
    }
}

impl MetadataTruncator {
    pub const DEFAULT_MAX_DESCRIPTION_CHARS: usize = 2000;

    pub fn new(max_description_chars: usize) -> Self {
        Self {
            max_description_chars: max_description_chars.max(1),
        }
    }

    pub fn max_description_chars(&self) -> usize {
        self.max_description_chars
    }

    /// Rewrite `xml` with every over-long description cut to the limit.
    ///
    /// The top-level identifier is rewritten to `doi` and truncated
    /// descriptions reference `target`. Everything else is copied as is.
    /// The same input always yields the same output.
    pub fn truncate(
        &self,
        doi: &Doi,
        xml: &str,
        target: Option<&str>,
    ) -> Result<String, MetadataError> {
        let mut reader = Reader::from_str(xml);
        let mut writer = Writer::new(Vec::with_capacity(xml.len()));

        let mut depth = 0usize;
        let mut seen_root = false;
        let mut capture: Option<(Capture, usize)> = None;
        let mut buffered: Vec<Event<'static>> = Vec::new();
        let mut text = String::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                MetadataError::Malformed(format!("at byte {}: {}", reader.buffer_position(), e))
            })?;

            if let Event::Eof = event {
                break;
            }

            if let Event::Start(ref e) | Event::Empty(ref e) = event {
                if depth == 0 {
                    let name = local_name(e.local_name().as_ref());
                    if seen_root {
                        return Err(MetadataError::Malformed("more than one root element".into()));
                    }
                    if name != ROOT_ELEMENT {
                        return Err(MetadataError::Invalid(format!(
                            "root element is <{}>, expected <{}>",
                            name, ROOT_ELEMENT
                        )));
                    }
                    seen_root = true;
                }
            }

            if let Some((kind, open_depth)) = &capture {
                let closes = matches!(event, Event::End(_)) && depth == *open_depth + 1;
                if closes {
                    let replacement = match kind {
                        Capture::Identifier => Some(doi.as_str().to_string()),
                        Capture::Description => self.shorten(&text, target),
                    };
                    match replacement {
                        Some(new_text) => {
                            write(&mut writer, Event::Text(BytesText::new(&new_text)))?
                        }
                        None => {
                            for e in buffered.drain(..) {
                                write(&mut writer, e)?;
                            }
                        }
                    }
                    buffered.clear();
                    text.clear();
                    capture = None;
                    depth -= 1;
                    write(&mut writer, event)?;
                    continue;
                }

                match &event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => depth -= 1,
                    Event::Text(t) => {
                        let unescaped = t
                            .unescape()
                            .map_err(|e| MetadataError::Malformed(e.to_string()))?;
                        text.push_str(&unescaped);
                    }
                    Event::CData(c) => text.push_str(&String::from_utf8_lossy(c)),
                    Event::Empty(e) if e.local_name().as_ref() == b"br" => text.push('\n'),
                    _ => {}
                }
                buffered.push(event.into_owned());
                continue;
            }

            match &event {
                Event::Start(e) => {
                    let name = e.local_name();
                    if name.as_ref() == b"description" {
                        capture = Some((Capture::Description, depth));
                    } else if name.as_ref() == b"identifier" && depth == 1 {
                        capture = Some((Capture::Identifier, depth));
                    }
                    depth += 1;
                }
                Event::End(_) => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| MetadataError::Malformed("unbalanced end tag".into()))?;
                }
                _ => {}
            }
            write(&mut writer, event)?;
        }

        if depth != 0 || capture.is_some() {
            return Err(MetadataError::Malformed(
                "document ends inside an open element".into(),
            ));
        }
        if !seen_root {
            return Err(MetadataError::Malformed("document is empty".into()));
        }

        String::from_utf8(writer.into_inner()).map_err(|e| MetadataError::Malformed(e.to_string()))
    }

    /// Shortened description, or `None` when it already fits
    fn shorten(&self, text: &str, target: Option<&str>) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.chars().count() <= self.max_description_chars {
            return None;
        }

        let cut: String = trimmed.chars().take(self.max_description_chars).collect();
        let cut = cut.trim_end();
        Some(match target {
            Some(target) => format!("{} ... (full description: {})", cut, target),
            None => format!("{} ...", cut),
        })
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), MetadataError> {
    writer
        .write_event(event)
        .map_err(|e| MetadataError::Malformed(format!("failed to write XML: {}", e)))
}
