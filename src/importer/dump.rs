use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use crate::error::{Error, Result};

/// One `<page>` element as it appears in the dump.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub ns: i64,
    pub id: i64,
    pub title: String,
    /// Text of the last revision, empty when the page has none.
    pub text: String,
}

#[derive(Clone, Copy)]
enum Field {
    Ns,
    Id,
    Title,
    Text,
}

/// Pull parser over a MediaWiki export. Holds at most one page in memory.
pub struct DumpReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    namespace: String,
    done: bool,
}

impl<R: BufRead> DumpReader<R> {
    pub fn new(source: R, namespace: &str) -> Self {
        DumpReader {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            namespace: namespace.to_string(),
            done: false,
        }
    }

    /// Advance to the next `<page>` and read it whole. `None` at end of document.
    pub fn next_page(&mut self) -> Result<Option<RawPage>> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    return Err(Error::parse(
                        format!("dump near byte {}", self.reader.buffer_position()),
                        e.to_string(),
                    ))
                }
            };
            let at_page = match event {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"page" => true,
                    b"mediawiki" => {
                        check_namespace(&e, &self.namespace);
                        false
                    }
                    _ => false,
                },
                Event::Eof => return Ok(None),
                _ => false,
            };
            if at_page {
                return self.read_page().map(Some);
            }
        }
    }

    fn read_page(&mut self) -> Result<RawPage> {
        let mut path: Vec<Vec<u8>> = Vec::new();
        let mut field: Option<Field> = None;
        let mut value = String::new();

        let mut ns: Option<String> = None;
        let mut id: Option<String> = None;
        let mut title: Option<String> = None;
        let mut text = String::new();

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => {
                    return Err(Error::parse(
                        page_context(title.as_deref(), self.reader.buffer_position()),
                        e.to_string(),
                    ))
                }
            };
            match event {
                Event::Start(e) => {
                    let name = e.local_name().as_ref().to_vec();
                    field = field_at(&path, &name);
                    if path.is_empty() && name == b"revision" {
                        text.clear();
                    }
                    value.clear();
                    path.push(name);
                }
                Event::Empty(e) => {
                    // <text/> or <revision/> carry no content
                    let name = e.local_name().as_ref().to_vec();
                    if matches!(field_at(&path, &name), Some(Field::Text))
                        || (path.is_empty() && name == b"revision")
                    {
                        text.clear();
                    }
                }
                Event::Text(e) if field.is_some() => {
                    let unescaped = e.unescape().map_err(|err| {
                        Error::parse(
                            page_context(title.as_deref(), self.reader.buffer_position()),
                            err.to_string(),
                        )
                    })?;
                    value.push_str(&unescaped);
                }
                Event::CData(e) if field.is_some() => {
                    value.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
                Event::End(_) => {
                    if path.is_empty() {
                        break;
                    }
                    match field.take() {
                        Some(Field::Ns) => ns = Some(std::mem::take(&mut value)),
                        Some(Field::Id) => id = Some(std::mem::take(&mut value)),
                        Some(Field::Title) => title = Some(std::mem::take(&mut value)),
                        Some(Field::Text) => text = std::mem::take(&mut value),
                        None => {}
                    }
                    path.pop();
                }
                Event::Eof => {
                    return Err(Error::parse(
                        page_context(title.as_deref(), self.reader.buffer_position()),
                        "document ended inside <page>",
                    ))
                }
                _ => {}
            }
        }

        let title = title.ok_or_else(|| {
            Error::parse(
                page_context(None, self.reader.buffer_position()),
                "page has no <title>",
            )
        })?;
        let ns = parse_number(ns, "ns", &title)?;
        let id = parse_number(id, "id", &title)?;
        Ok(RawPage { ns, id, title, text })
    }
}

impl<R: BufRead> Iterator for DumpReader<R> {
    type Item = Result<RawPage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.next_page().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

/// Which page field, if any, an element at `path` (relative to `<page>`) holds.
fn field_at(path: &[Vec<u8>], name: &[u8]) -> Option<Field> {
    match (path, name) {
        ([], b"ns") => Some(Field::Ns),
        ([], b"id") => Some(Field::Id),
        ([], b"title") => Some(Field::Title),
        ([parent], b"text") if parent.as_slice() == b"revision" => Some(Field::Text),
        _ => None,
    }
}

fn check_namespace(root: &BytesStart, expected: &str) {
    let declared = root
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"xmlns")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned());
    match declared {
        Some(ns) if ns == expected => {}
        Some(ns) => warn!(declared = %ns, expected, "dump declares an unexpected export namespace"),
        None => warn!(expected, "dump root has no xmlns declaration"),
    }
}

fn parse_number(raw: Option<String>, field: &str, title: &str) -> Result<i64> {
    let raw = raw.ok_or_else(|| {
        Error::parse(format!("page {:?}", title), format!("missing <{}>", field))
    })?;
    raw.trim().parse().map_err(|_| {
        Error::parse(
            format!("page {:?}", title),
            format!("<{}> is not an integer: {:?}", field, raw),
        )
    })
}

fn page_context(title: Option<&str>, position: impl std::fmt::Display) -> String {
    match title {
        Some(t) => format!("page {:?}", t),
        None => format!("page near byte {}", position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = crate::settings::DEFAULT_NAMESPACE;

    fn read_all(xml: &str) -> Result<Vec<RawPage>> {
        DumpReader::new(xml.as_bytes(), NS).collect()
    }

    #[test]
    fn reads_page_fields_not_revision_ids() {
        let xml = r#"<mediawiki xmlns="http://www.mediawiki.org/xml/export-0.11/">
          <siteinfo><sitename>Test</sitename></siteinfo>
          <page>
            <title>Robin &amp; friends</title>
            <ns>0</ns>
            <id>42</id>
            <revision>
              <id>9001</id>
              <contributor><username>x</username><id>5</id></contributor>
              <text bytes="12" xml:space="preserve">A &lt;small&gt; bird</text>
            </revision>
          </page>
        </mediawiki>"#;
        let pages = read_all(xml).unwrap();
        assert_eq!(
            pages,
            vec![RawPage {
                ns: 0,
                id: 42,
                title: "Robin & friends".into(),
                text: "A <small> bird".into(),
            }]
        );
    }

    #[test]
    fn missing_revision_and_empty_text() {
        let xml = r#"<mediawiki>
          <page><title>A</title><ns>0</ns><id>1</id></page>
          <page><title>B</title><ns>0</ns><id>2</id><revision><text bytes="0" /></revision></page>
        </mediawiki>"#;
        let pages = read_all(xml).unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages.iter().all(|p| p.text.is_empty()));
    }

    #[test]
    fn last_revision_wins() {
        let xml = r#"<mediawiki><page><title>A</title><ns>0</ns><id>1</id>
          <revision><text>old</text></revision>
          <revision><text>new</text></revision>
        </page></mediawiki>"#;
        assert_eq!(read_all(xml).unwrap()[0].text, "new");
    }

    #[test]
    fn bad_id_is_a_parse_error() {
        let xml = "<mediawiki><page><title>A</title><ns>0</ns><id>abc</id></page></mediawiki>";
        let err = read_all(xml).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("\"A\""));
    }

    #[test]
    fn truncated_document_is_a_parse_error() {
        let xml = "<mediawiki><page><title>A</title><ns>0</ns>";
        assert!(matches!(read_all(xml), Err(Error::Parse { .. })));
    }
}
