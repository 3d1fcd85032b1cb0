//! A tiny owned DOM, just enough to do the `.find(tag)` / `.get(attr)`
//! style lookups the parser needs over small XML fragments. We never parse
//! the whole project file as a tree (only hand-sliced fragments around the
//! tags we care about), so a full-featured DOM crate would be overkill.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::XmlProjectError;

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn get(&self, attr: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == attr)
            .map(|(_, v)| v.as_str())
    }
}

/// Parses a single well-formed XML fragment (one root element) into an
/// `Element` tree.
pub fn parse_fragment(bytes: &[u8]) -> Result<Element, XmlProjectError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let el = Element {
                    tag: decode_name(e.name().as_ref()),
                    attrs: decode_attrs(&e)?,
                    children: Vec::new(),
                };
                stack.push(el);
            }
            Event::Empty(e) => {
                let el = Element {
                    tag: decode_name(e.name().as_ref()),
                    attrs: decode_attrs(&e)?,
                    children: Vec::new(),
                };
                push_finished(&mut stack, &mut root, el);
            }
            Event::End(_) => {
                let el = stack.pop().ok_or(XmlProjectError::UnbalancedFragment)?;
                push_finished(&mut stack, &mut root, el);
            }
            _ => {}
        }
        buf.clear();
    }

    root.ok_or(XmlProjectError::UnbalancedFragment)
}

fn push_finished(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => *root = Some(el),
    }
}

fn decode_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn decode_attrs(e: &quick_xml::events::BytesStart) -> Result<Vec<(String, String)>, XmlProjectError> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = decode_name(attr.key.as_ref());
        let value = attr.unescape_value()?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}
