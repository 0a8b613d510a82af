//! XMP packet reading and writing
//!
//! Packets are read with a namespace-aware XML reader, so properties are
//! matched by namespace URI whatever prefix the writer chose. Simple values,
//! attribute shorthand on `rdf:Description`, `rdf:Alt`/`rdf:Bag`/`rdf:Seq`
//! containers and `rdf:resource` references are understood.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
pub const NS_XMP: &str = "http://ns.adobe.com/xap/1.0/";
pub const NS_IPTC_EXT: &str = "http://iptc.org/std/Iptc4xmpExt/2008-02-29/";
/// Namespace of the fields this tool writes
pub const NS_VIBE: &str = "http://ns.example.com/vibe/1.0/";

const NS_RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Properties of interest in an XMP packet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmpProperties {
    /// `dc:description` (x-default alternative)
    pub description: Option<String>,
    /// `dc:subject` bag
    pub subjects: Vec<String>,
    /// `dc:rights`
    pub rights: Option<String>,
    /// First `dc:creator` entry
    pub creator: Option<String>,
    /// `xmp:CreatorTool`
    pub creator_tool: Option<String>,
    /// `Iptc4xmpExt:DigitalSourceType`
    pub digital_source_type: Option<String>,
    /// Every property in the tool namespace, keyed by local name
    pub tool_fields: BTreeMap<String, String>,
}

impl XmpProperties {
    fn apply(&mut self, property: Property) {
        let Property { ns, name, values } = property;
        let mut values = values.into_iter();
        match (ns, name.as_str()) {
            (Ns::Dc, "subject") => {
                if self.subjects.is_empty() {
                    self.subjects = values.collect();
                }
            }
            (Ns::Dc, "description") => first(&mut self.description, values.next()),
            (Ns::Dc, "rights") => first(&mut self.rights, values.next()),
            (Ns::Dc, "creator") => first(&mut self.creator, values.next()),
            (Ns::Xmp, "CreatorTool") => first(&mut self.creator_tool, values.next()),
            (Ns::IptcExt, "DigitalSourceType") => {
                first(&mut self.digital_source_type, values.next())
            }
            (Ns::Tool, _) => {
                if let Some(value) = values.next() {
                    self.tool_fields.entry(name.clone()).or_insert(value);
                }
            }
            _ => {}
        }
    }
}

fn first(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XmpError {
    #[error("packet is not XMP")]
    NotXmp,

    #[error("malformed XMP: {0}")]
    Malformed(String),

    #[error("'{0}' is not a valid XMP property name")]
    InvalidName(String),
}

impl From<quick_xml::Error> for XmpError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Namespaces the reader cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    Rdf,
    Dc,
    Xmp,
    IptcExt,
    Tool,
    Other,
}

impl Ns {
    fn of(result: ResolveResult<'_>) -> Self {
        let ResolveResult::Bound(Namespace(uri)) = result else {
            return Self::Other;
        };
        [
            (NS_RDF, Self::Rdf),
            (NS_DC, Self::Dc),
            (NS_XMP, Self::Xmp),
            (NS_IPTC_EXT, Self::IptcExt),
            (NS_VIBE, Self::Tool),
        ]
        .into_iter()
        .find(|(known, _)| known.as_bytes() == uri)
        .map_or(Self::Other, |(_, ns)| ns)
    }
}

/// One property with its value(s), in document order
#[derive(Debug)]
struct Property {
    ns: Ns,
    name: String,
    values: Vec<String>,
}

/// A property element whose content is still being read
struct OpenProperty {
    ns: Ns,
    name: String,
    depth: usize,
    items: Vec<String>,
    text: String,
    in_item: bool,
}

impl OpenProperty {
    fn finish(self) -> Property {
        let values = if self.items.is_empty() {
            let text = self.text.trim();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            }
        } else {
            self.items
        };
        Property {
            ns: self.ns,
            name: self.name,
            values,
        }
    }
}

/// Read an XMP packet into [`XmpProperties`]
pub fn decode(packet: &str) -> Result<XmpProperties, XmpError> {
    let mut reader = NsReader::from_str(packet);
    let mut props = XmpProperties::default();
    let mut is_xmp = false;

    let mut depth = 0usize;
    let mut description_depth: Option<usize> = None;
    let mut open: Option<OpenProperty> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                let (resolved, local) = reader.resolve_element(e.name());
                let ns = Ns::of(resolved);
                let local = String::from_utf8_lossy(local.as_ref()).into_owned();

                if let Some(property) = open.as_mut() {
                    if ns == Ns::Rdf && local == "li" {
                        property.in_item = true;
                        property.text.clear();
                    }
                    continue;
                }
                match (ns, local.as_str()) {
                    (_, "xmpmeta") | (Ns::Rdf, "RDF") => is_xmp = true,
                    (Ns::Rdf, "Description") => {
                        description_depth = Some(depth);
                        for property in attribute_properties(&reader, &e)? {
                            props.apply(property);
                        }
                    }
                    _ if description_depth == Some(depth - 1) => {
                        open = Some(OpenProperty {
                            ns,
                            name: local,
                            depth,
                            items: Vec::new(),
                            text: String::new(),
                            in_item: false,
                        });
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if open.is_some() {
                    continue;
                }
                let (resolved, local) = reader.resolve_element(e.name());
                let ns = Ns::of(resolved);
                let local = String::from_utf8_lossy(local.as_ref()).into_owned();

                if ns == Ns::Rdf && local == "Description" {
                    for property in attribute_properties(&reader, &e)? {
                        props.apply(property);
                    }
                } else if description_depth == Some(depth) {
                    if let Some(resource) = resource_attribute(&reader, &e)? {
                        props.apply(Property {
                            ns,
                            name: local,
                            values: vec![resource],
                        });
                    }
                }
            }
            Event::Text(e) => {
                if let Some(property) = open.as_mut() {
                    property.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(property) = open.as_mut() {
                    property.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                if open.as_ref().is_some_and(|p| p.depth == depth) {
                    if let Some(property) = open.take() {
                        props.apply(property.finish());
                    }
                } else if let Some(property) = open.as_mut() {
                    if property.in_item {
                        let item = property.text.trim().to_string();
                        if !item.is_empty() {
                            property.items.push(item);
                        }
                        property.text.clear();
                        property.in_item = false;
                    }
                }
                if description_depth == Some(depth) {
                    description_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if is_xmp {
        Ok(props)
    } else {
        Err(XmpError::NotXmp)
    }
}

/// Properties written as attributes of `rdf:Description`
fn attribute_properties(
    reader: &NsReader<&[u8]>,
    element: &BytesStart<'_>,
) -> Result<Vec<Property>, XmpError> {
    let mut found = Vec::new();
    for attr in element.attributes().flatten() {
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let ns = Ns::of(resolved);
        if matches!(ns, Ns::Rdf | Ns::Other) {
            continue;
        }
        found.push(Property {
            ns,
            name: String::from_utf8_lossy(local.as_ref()).into_owned(),
            values: vec![attr.unescape_value()?.trim().to_string()],
        });
    }
    Ok(found)
}

/// `rdf:resource` of an empty property element
fn resource_attribute(
    reader: &NsReader<&[u8]>,
    element: &BytesStart<'_>,
) -> Result<Option<String>, XmpError> {
    for attr in element.attributes().flatten() {
        let (resolved, local) = reader.resolve_attribute(attr.key);
        if Ns::of(resolved) == Ns::Rdf && local.as_ref() == b"resource" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Serialize properties into a complete `<?xpacket?>`-wrapped packet
pub fn build_packet(props: &XmpProperties) -> Result<String, XmpError> {
    for name in props.tool_fields.keys() {
        if !is_xml_name(name) {
            return Err(XmpError::InvalidName(name.clone()));
        }
    }

    let mut body = String::new();
    if let Some(description) = &props.description {
        body.push_str(&format!(
            "   <dc:description><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:description>\n",
            escape(description.as_str())
        ));
    }
    if !props.subjects.is_empty() {
        body.push_str("   <dc:subject><rdf:Bag>");
        for subject in &props.subjects {
            body.push_str(&format!("<rdf:li>{}</rdf:li>", escape(subject)));
        }
        body.push_str("</rdf:Bag></dc:subject>\n");
    }
    if let Some(rights) = &props.rights {
        body.push_str(&format!(
            "   <dc:rights><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:rights>\n",
            escape(rights)
        ));
    }
    if let Some(creator) = &props.creator {
        body.push_str(&format!(
            "   <dc:creator><rdf:Seq><rdf:li>{}</rdf:li></rdf:Seq></dc:creator>\n",
            escape(creator)
        ));
    }
    if let Some(tool) = &props.creator_tool {
        body.push_str(&format!("   <xmp:CreatorTool>{}</xmp:CreatorTool>\n", escape(tool)));
    }
    if let Some(source) = &props.digital_source_type {
        body.push_str(&format!(
            "   <Iptc4xmpExt:DigitalSourceType>{}</Iptc4xmpExt:DigitalSourceType>\n",
            escape(source)
        ));
    }
    for (name, value) in &props.tool_fields {
        body.push_str(&format!("   <vibe:{name}>{}</vibe:{name}>\n", escape(value)));
    }

    Ok(format!(
        "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n\
         <x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n \
         <rdf:RDF xmlns:rdf=\"{NS_RDF}\">\n  \
         <rdf:Description rdf:about=\"\"\n    \
         xmlns:dc=\"{NS_DC}\"\n    \
         xmlns:xmp=\"{NS_XMP}\"\n    \
         xmlns:Iptc4xmpExt=\"{NS_IPTC_EXT}\"\n    \
         xmlns:vibe=\"{NS_VIBE}\">\n\
         {body}  \
         </rdf:Description>\n \
         </rdf:RDF>\n\
         </x:xmpmeta>\n\
         <?xpacket end=\"w\"?>"
    ))
}


fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_props() -> XmpProperties {
        let mut tool_fields = BTreeMap::new();
        tool_fields.insert("prompt".to_string(), "a cat & a dog".to_string());
        tool_fields.insert("model".to_string(), "SDXL 1.0".to_string());
        tool_fields.insert("seed".to_string(), "42".to_string());
        XmpProperties {
            description: Some("Two <friends>".to_string()),
            subjects: vec!["cat".to_string(), "dog".to_string()],
            rights: Some("CC-BY".to_string()),
            creator: Some("Ann".to_string()),
            creator_tool: None,
            digital_source_type: None,
            tool_fields,
        }
    }

    #[test]
    fn test_build_then_decode() {
        let props = sample_props();
        let packet = build_packet(&props).unwrap();
        assert!(packet.starts_with("<?xpacket begin="));
        assert!(packet.contains("xmlns:vibe=\"http://ns.example.com/vibe/1.0/\""));
        assert!(packet.contains("a cat &amp; a dog"));
        assert_eq!(decode(&packet).unwrap(), props);
    }

    #[test]
    fn test_build_rejects_bad_name() {
        let mut props = XmpProperties::default();
        props.tool_fields.insert("not a name".to_string(), "x".to_string());
        assert_eq!(
            build_packet(&props),
            Err(XmpError::InvalidName("not a name".to_string()))
        );
    }

    #[test]
    fn test_decode_attribute_form_and_custom_prefix() {
        let packet = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
            <rdf:Description rdf:about=""
                xmlns:xap="http://ns.adobe.com/xap/1.0/"
                xmlns:v="http://ns.example.com/vibe/1.0/"
                xap:CreatorTool="Midjourney v6"
                v:model="mj-6">
              <v:prompt>neon city</v:prompt>
            </rdf:Description></rdf:RDF></x:xmpmeta>"#;
        let props = decode(packet).unwrap();
        assert_eq!(props.creator_tool.as_deref(), Some("Midjourney v6"));
        assert_eq!(props.tool_fields.get("model").map(String::as_str), Some("mj-6"));
        assert_eq!(props.tool_fields.get("prompt").map(String::as_str), Some("neon city"));
    }

    #[test]
    fn test_decode_digital_source_type_resource() {
        let packet = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><rdf:Description
            xmlns:Iptc4xmpExt="http://iptc.org/std/Iptc4xmpExt/2008-02-29/">
            <Iptc4xmpExt:DigitalSourceType rdf:resource="http://cv.iptc.org/newscodes/digitalsourcetype/trainedAlgorithmicMedia"/>
            </rdf:Description></rdf:RDF></x:xmpmeta>"#;
        let props = decode(packet).unwrap();
        assert!(props
            .digital_source_type
            .as_deref()
            .unwrap()
            .ends_with("trainedAlgorithmicMedia"));
        assert!(props.tool_fields.is_empty());
    }

    #[test]
    fn test_decode_character_references() {
        let packet = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
            <rdf:Description xmlns:dc="http://purl.org/dc/elements/1.1/" dc:creator="Jo &#233;">
              <dc:rights><rdf:Alt><rdf:li xml:lang="x-default">&#xA9; 2024 Jo &#233;</rdf:li></rdf:Alt></dc:rights>
              <dc:description><rdf:Alt><rdf:li xml:lang="x-default">line one&#10;line two</rdf:li></rdf:Alt></dc:description>
            </rdf:Description></rdf:RDF></x:xmpmeta>"#;
        let props = decode(packet).unwrap();
        assert_eq!(props.rights.as_deref(), Some("© 2024 Jo é"));
        assert_eq!(props.creator.as_deref(), Some("Jo é"));
        assert_eq!(props.description.as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn test_decode_matches_namespace_not_prefix() {
        // `dc` bound to a foreign namespace must not be read as Dublin Core
        let packet = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
            <rdf:Description xmlns:dc="urn:not-dublin-core" xmlns:d="http://purl.org/dc/elements/1.1/">
              <dc:rights>wrong</dc:rights>
              <d:subject><rdf:Bag><rdf:li>sea</rdf:li><rdf:li>fog</rdf:li></rdf:Bag></d:subject>
            </rdf:Description></rdf:RDF>"#;
        let props = decode(packet).unwrap();
        assert_eq!(props.rights, None);
        assert_eq!(props.subjects, vec!["sea", "fog"]);
    }

    #[test]
    fn test_decode_not_xmp() {
        assert_eq!(decode("hello world"), Err(XmpError::NotXmp));
        assert!(matches!(
            decode("<x:xmpmeta><rdf:RDF></x:xmpmeta>"),
            Err(XmpError::Malformed(_))
        ));
    }
}
