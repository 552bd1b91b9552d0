// SPDX-License-Identifier: MIT
//! Human-readable projection of a preset
//!
//! Extracts the `patch/meta` record and the ordered `patch/parameters`
//! entries from the XML payload, and carries the wavetable blobs alongside so
//! the whole thing can travel as JSON. The view is derived data: a byte-exact
//! save always goes through the original XML payload.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::document::PatchDocument;
use crate::error::{FxpError, Result};
use crate::writer::SizePolicy;
use crate::xml::{XmlElement, XmlTree};

const ROOT_ELEMENT: &str = "patch";
const META_ELEMENT: &str = "meta";
const PARAMETERS_ELEMENT: &str = "parameters";

/// `patch/meta` attributes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatchMeta {
    pub name: Option<String>,
    pub category: Option<String>,
    pub comment: Option<String>,
    pub author: Option<String>,
}

impl PatchMeta {
    fn from_element(element: &XmlElement) -> Self {
        let attr = |key: &str| element.attribute(key).map(str::to_string);
        Self {
            name: attr("name"),
            category: attr("category"),
            comment: attr("comment"),
            author: attr("author"),
        }
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("name", self.name.as_deref()),
            ("category", self.category.as_deref()),
            ("comment", self.comment.as_deref()),
            ("author", self.author.as_deref()),
        ]
    }
}

/// A parameter's `type` and `value` attributes, verbatim
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Option<String>,
}

impl Parameter {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            value: Some(value.into()),
        }
    }
}

/// Parameters keyed by element name, in source order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterMap {
    entries: Vec<(String, Parameter)>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced entry keeps its original position
    pub fn insert(&mut self, name: impl Into<String>, parameter: Parameter) -> Option<Parameter> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, parameter)),
            None => {
                self.entries.push((name, parameter));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, Parameter)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (K, Parameter)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, parameter) in iter {
            map.insert(name, parameter);
        }
        map
    }
}

impl Serialize for ParameterMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, parameter) in &self.entries {
            map.serialize_entry(name, parameter)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParameterMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ParameterMapVisitor;

        impl<'de> Visitor<'de> for ParameterMapVisitor {
            type Value = ParameterMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter name to {type, value}")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<ParameterMap, A::Error> {
                let mut map = ParameterMap::new();
                while let Some((name, parameter)) = access.next_entry::<String, Parameter>()? {
                    map.insert(name, parameter);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ParameterMapVisitor)
    }
}

/// How an edited view is written back into a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Keep the original XML bytes, only swap wavetables
    PreserveXml,

    /// Re-apply meta and parameters to the XML tree and print it again
    RenderXml,
}

/// Extracted meta, parameters and wavetables of one preset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HumanReadableView {
    pub meta: Option<PatchMeta>,
    pub parameters: ParameterMap,
    pub wavetables: Vec<Vec<u8>>,
}

#[derive(Serialize)]
struct InterchangeOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<&'a PatchMeta>,
    parameters: &'a ParameterMap,
    wavetables: Vec<String>,
}

#[derive(Deserialize)]
struct InterchangeIn {
    #[serde(default)]
    meta: Option<PatchMeta>,
    parameters: ParameterMap,
    wavetables: Vec<String>,
}

impl HumanReadableView {
    /// Extract the view from an XML payload
    pub fn from_xml_payload(bytes: &[u8], wavetables: &[Vec<u8>]) -> Result<Self> {
        let tree = XmlTree::parse(bytes)?;
        let root = patch_root(&tree)?;

        let meta = root.child(META_ELEMENT).map(PatchMeta::from_element);
        let parameters = root
            .child(PARAMETERS_ELEMENT)
            .map(|params| {
                params
                    .children
                    .iter()
                    .map(|p| {
                        let parameter = Parameter {
                            kind: p.attribute("type").map(str::to_string),
                            value: p.attribute("value").map(str::to_string),
                        };
                        (p.name.clone(), parameter)
                    })
                    .collect::<ParameterMap>()
            })
            .unwrap_or_default();

        Ok(Self {
            meta,
            parameters,
            wavetables: wavetables.to_vec(),
        })
    }

    pub fn from_document(document: &PatchDocument) -> Result<Self> {
        Self::from_xml_payload(document.xml_payload(), document.wavetables())
    }

    /// Encode as JSON, wavetables as base64 strings
    pub fn to_interchange_form(&self) -> Result<Vec<u8>> {
        let out = InterchangeOut {
            meta: self.meta.as_ref(),
            parameters: &self.parameters,
            wavetables: self.wavetables.iter().map(|wt| STANDARD.encode(wt)).collect(),
        };
        Ok(serde_json::to_vec_pretty(&out)?)
    }

    pub fn from_interchange_form(bytes: &[u8]) -> Result<Self> {
        let form: InterchangeIn = serde_json::from_slice(bytes)?;
        let wavetables = form
            .wavetables
            .iter()
            .enumerate()
            .map(|(i, encoded)| {
                STANDARD.decode(encoded).map_err(|e| {
                    FxpError::MalformedInterchange(format!("wavetable {}: {}", i, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            meta: form.meta,
            parameters: form.parameters,
            wavetables,
        })
    }

    /// Apply meta and parameters onto `original_xml` and print the result
    ///
    /// Parameters missing from the view are left alone; new ones are
    /// appended. The output is not byte-compatible with the input.
    pub fn render_into(&self, original_xml: &[u8]) -> Result<Vec<u8>> {
        let mut tree = XmlTree::parse(original_xml)?;
        patch_root(&tree)?;
        let root = &mut tree.root;

        if let Some(meta) = &self.meta {
            if root.child(META_ELEMENT).is_none() {
                root.children.insert(0, XmlElement::new(META_ELEMENT));
            }
            if let Some(element) = root.child_mut(META_ELEMENT) {
                for (key, value) in meta.fields() {
                    if let Some(value) = value {
                        element.set_attribute(key, value);
                    }
                }
            }
        }

        if !self.parameters.is_empty() {
            if root.child(PARAMETERS_ELEMENT).is_none() {
                root.children.push(XmlElement::new(PARAMETERS_ELEMENT));
            }
            if let Some(params) = root.child_mut(PARAMETERS_ELEMENT) {
                for (name, parameter) in self.parameters.iter() {
                    if params.child(name).is_none() {
                        params.children.push(XmlElement::new(name));
                    }
                    if let Some(element) = params.child_mut(name) {
                        if let Some(kind) = &parameter.kind {
                            element.set_attribute("type", kind.as_str());
                        }
                        if let Some(value) = &parameter.value {
                            element.set_attribute("value", value.as_str());
                        }
                    }
                }
            }
        }

        tree.print()
    }

    /// Write the view back into `document`
    ///
    /// `policy` only applies to `RenderXml`, whose payload length changes.
    /// `PreserveXml` goes through [`Self::apply_wavetables`].
    pub fn apply_to(
        &self,
        document: &mut PatchDocument,
        strategy: WriteStrategy,
        policy: SizePolicy,
    ) -> Result<()> {
        match strategy {
            WriteStrategy::PreserveXml => self.apply_wavetables(document),
            WriteStrategy::RenderXml => {
                let rendered = self.render_into(document.xml_payload())?;
                if rendered != document.xml_payload() {
                    document.set_xml_payload(rendered);
                }
                if document.wavetables() != self.wavetables.as_slice() {
                    document.set_wavetables(self.wavetables.clone());
                }
                document.refresh_sizes(policy)
            }
        }
    }

    /// Keep the document's XML bytes and swap in this view's wavetables
    ///
    /// An unchanged view leaves the document byte-identical.
    pub fn apply_wavetables(&self, document: &mut PatchDocument) -> Result<()> {
        if document.wavetables() == self.wavetables.as_slice() {
            return Ok(());
        }
        document.swap_wavetables(self.wavetables.clone())?;
        Ok(())
    }
}

/// Outline used for the extracted-data sidecar
impl fmt::Display for HumanReadableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(meta) = &self.meta {
            writeln!(f, "meta:")?;
            for (key, value) in meta.fields() {
                writeln!(f, "    {}: {}", key, value.unwrap_or("-"))?;
            }
        }

        writeln!(f, "parameters:")?;
        for (name, parameter) in self.parameters.iter() {
            writeln!(
                f,
                "    {}: type={} value={}",
                name,
                parameter.kind.as_deref().unwrap_or("-"),
                parameter.value.as_deref().unwrap_or("-")
            )?;
        }

        let total: usize = self.wavetables.iter().map(Vec::len).sum();
        writeln!(
            f,
            "wavetables: {} blob(s), {} bytes",
            self.wavetables.len(),
            total
        )
    }
}

fn patch_root(tree: &XmlTree) -> Result<&XmlElement> {
    if tree.root.name == ROOT_ELEMENT {
        Ok(&tree.root)
    } else {
        Err(FxpError::MalformedXml(format!(
            "root element is <{}>, expected <{}>",
            tree.root.name, ROOT_ELEMENT
        )))
    }
}
