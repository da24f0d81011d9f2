use crate::opc::constants::{namespace, target_mode};
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::PackURI;
use crate::xml::escape_attr;
/// Relationship-related objects for OPC packages.
///
/// Provides types for managing the relationships of a single source part,
/// including parsing from and serializing to `.rels` payloads. Relationship
/// order is preserved so a mutated `.rels` file keeps its original entries in
/// place and new ones appended.
use quick_xml::Reader;
use quick_xml::events::Event;

/// A single relationship from a source part to a target.
///
/// Identified by an rId (relationship ID); internal relationships point at
/// another part, external ones at a URL.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1", "rId2")
    r_id: String,

    /// Relationship type URI
    reltype: String,

    /// Target reference - either a relative part reference or external URL
    target_ref: String,

    /// Base URI for resolving relative references
    base_uri: String,

    /// Whether this is an external relationship
    is_external: bool,
}

impl Relationship {
    pub fn new(
        r_id: String,
        reltype: String,
        target_ref: String,
        base_uri: String,
        is_external: bool,
    ) -> Self {
        Self {
            r_id,
            reltype,
            target_ref,
            base_uri,
            is_external,
        }
    }

    /// Get the relationship ID.
    #[inline]
    pub fn r_id(&self) -> &str {
        &self.r_id
    }

    /// Get the relationship type.
    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Get the target reference.
    ///
    /// For internal relationships this is a relative part reference, for
    /// external relationships an absolute URL.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// Get the absolute target partname for internal relationships.
    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external {
            return Err(OpcError::InvalidRelationship(
                "Cannot get target_partname for external relationship".to_string(),
            ));
        }
        PackURI::from_rel_ref(&self.base_uri, &self.target_ref).map_err(OpcError::InvalidPackUri)
    }
}

/// Ordered collection of relationships from a single source part.
#[derive(Debug, Clone)]
pub struct Relationships {
    /// Base URI for resolving relative references
    base_uri: String,

    /// Relationships in document order
    rels: Vec<Relationship>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new(base_uri: String) -> Self {
        Self {
            base_uri,
            rels: Vec::new(),
        }
    }

    /// Parse a `.rels` payload.
    ///
    /// # Arguments
    /// * `xml` - Raw bytes of the relationships part
    /// * `base_uri` - Base URI of the owning part's directory, used to
    ///   resolve relative targets
    pub fn from_xml(xml: &[u8], base_uri: &str) -> Result<Self> {
        let mut rels = Self::new(base_uri.to_string());
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    if e.local_name().as_ref() == b"Relationship" {
                        let mut r_id = None;
                        let mut reltype = None;
                        let mut target_ref = None;
                        let mut mode = target_mode::INTERNAL.to_string();

                        for attr in e.attributes() {
                            let attr = attr?;
                            match attr.key.as_ref() {
                                b"Id" => {
                                    r_id = Some(attr.unescape_value()?.to_string());
                                },
                                b"Type" => {
                                    reltype = Some(attr.unescape_value()?.to_string());
                                },
                                b"Target" => {
                                    target_ref = Some(attr.unescape_value()?.to_string());
                                },
                                b"TargetMode" => {
                                    mode = attr.unescape_value()?.to_string();
                                },
                                _ => {},
                            }
                        }

                        if let (Some(id), Some(rt), Some(tr)) = (r_id, reltype, target_ref) {
                            rels.rels.push(Relationship::new(
                                id,
                                rt,
                                tr,
                                base_uri.to_string(),
                                mode == target_mode::EXTERNAL,
                            ));
                        }
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::InvalidRelationship(format!(
                        "rels parse error: {}",
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Get a relationship by its ID.
    pub fn get(&self, r_id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.r_id == r_id)
    }

    /// Add a new internal relationship with the next available rId.
    ///
    /// # Returns
    /// The relationship ID assigned to the new entry.
    pub fn add(&mut self, reltype: &str, target_ref: &str) -> String {
        let r_id = self.next_r_id();
        self.rels.push(Relationship::new(
            r_id.clone(),
            reltype.to_string(),
            target_ref.to_string(),
            self.base_uri.clone(),
            false,
        ));
        r_id
    }

    /// Get the rId of an existing relationship with matching type and
    /// target, or add a new one.
    pub fn get_or_add(&mut self, reltype: &str, target_ref: &str) -> String {
        if let Some(r_id) = self.find_by_type_and_target(reltype, target_ref) {
            return r_id.to_string();
        }
        self.add(reltype, target_ref)
    }

    /// Find the rId of a relationship with matching type and target.
    pub fn find_by_type_and_target(&self, reltype: &str, target_ref: &str) -> Option<&str> {
        self.rels
            .iter()
            .find(|rel| rel.reltype == reltype && rel.target_ref == target_ref)
            .map(|rel| rel.r_id.as_str())
    }

    /// Iterate relationships of a specific type, in document order.
    pub fn by_type<'a>(&'a self, reltype: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.rels.iter().filter(move |rel| rel.reltype == reltype)
    }

    /// Allocate the next available relationship ID.
    ///
    /// IDs are monotonic over the numeric suffixes already present
    /// ("rId{max+1}"); suffixes freed by removal are never handed out again
    /// while a higher one exists.
    fn next_r_id(&self) -> String {
        let max = self
            .rels
            .iter()
            .filter_map(|rel| {
                rel.r_id
                    .strip_prefix("rId")
                    .and_then(|suffix| suffix.parse::<u32>().ok())
            })
            .max()
            .unwrap_or(0);

        format!("rId{}", max + 1)
    }

    /// Remove a relationship by its ID.
    pub fn remove(&mut self, r_id: &str) -> Option<Relationship> {
        let pos = self.rels.iter().position(|rel| rel.r_id == r_id)?;
        Some(self.rels.remove(pos))
    }

    /// Get an iterator over all relationships.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    /// Get the number of relationships in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Check if the collection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Serialize to `.rels` XML, entries in stored order.
    pub fn to_xml(&self) -> Vec<u8> {
        let mut xml = String::with_capacity(1024);

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<Relationships xmlns="{}">"#,
            namespace::OPC_RELATIONSHIPS
        ));

        for rel in &self.rels {
            let mode = if rel.is_external {
                r#" TargetMode="External""#
            } else {
                ""
            };
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}"{}/>"#,
                escape_attr(&rel.r_id),
                escape_attr(&rel.reltype),
                escape_attr(&rel.target_ref),
                mode
            ));
        }

        xml.push_str("</Relationships>");
        xml.into_bytes()
    }
}
