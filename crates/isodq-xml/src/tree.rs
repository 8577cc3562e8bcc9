//! # Element Tree
//!
//! An owned, immutable element tree produced by the parser. A document is
//! created once per message and shared by reference across every rule
//! evaluation of that message; nothing here mutates after construction.
//!
//! Only what structural matching needs is kept: qualified and local names,
//! the resolved namespace URI, attributes, and direct text. Comments,
//! processing instructions, and the prolog are dropped.
//!
//! Whole-tree walks use an explicit stack rather than recursion, so their
//! stack use does not grow with nesting depth.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// One element of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Name as written, including any prefix (`ns1:MsgId`).
    pub name: String,
    /// Local part of the name (`MsgId`).
    pub local_name: String,
    /// Namespace URI in scope for the element's prefix, if any.
    pub namespace: Option<String>,
    /// Attributes in document order, names as written.
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content with surrounding whitespace trimmed.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// A new element with no attributes, text, or children.
    pub fn new(name: &str, namespace: Option<String>) -> Self {
        let local_name = match name.rfind(':') {
            Some(i) => name[i + 1..].to_string(),
            None => name.to_string(),
        };
        Self {
            name: name.to_string(),
            local_name,
            namespace,
            attributes: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Direct children with the given local name.
    pub fn children_named<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.local_name == local_name)
    }
}

/// An element located by name search, with its ancestry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<'a> {
    /// The element found.
    pub element: &'a Element,
    /// Local names from the document root down to and including the element.
    pub path: Vec<&'a str>,
}

impl Located<'_> {
    /// Local name of the element's immediate parent; `None` for the root.
    pub fn parent_name(&self) -> Option<&str> {
        if self.path.len() < 2 {
            return None;
        }
        self.path.get(self.path.len() - 2).copied()
    }
}

/// A parsed document: a single root element plus its default namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: Element,
    default_namespace: Option<String>,
}

impl XmlDocument {
    /// Wrap a root element. The default namespace is the one the root
    /// declares (or inherits) for unprefixed names.
    pub fn new(root: Element, default_namespace: Option<String>) -> Self {
        Self {
            root,
            default_namespace,
        }
    }

    /// The root element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Default namespace URI declared on the root, if any.
    pub fn default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Evaluate an absolute element path.
    ///
    /// Segments are compared by local name. When the document declares a
    /// default namespace, every element on the path must also be in that
    /// namespace. Returns true if at least one element matches the full path.
    pub fn path_exists<S: AsRef<str>>(&self, segments: &[S]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return false;
        };
        self.step_matches(&self.root, first.as_ref()) && self.descend(&self.root, rest)
    }

    fn descend<S: AsRef<str>>(&self, element: &Element, rest: &[S]) -> bool {
        let Some((next, tail)) = rest.split_first() else {
            return true;
        };
        element
            .children
            .iter()
            .any(|child| self.step_matches(child, next.as_ref()) && self.descend(child, tail))
    }

    fn step_matches(&self, element: &Element, segment: &str) -> bool {
        if element.local_name != segment {
            return false;
        }
        match &self.default_namespace {
            Some(ns) => element.namespace.as_deref() == Some(ns.as_str()),
            None => true,
        }
    }

    /// Every element whose local name is `local_name`, in document order,
    /// ignoring namespaces and ancestry.
    pub fn find_by_local_name<'a>(&'a self, local_name: &str) -> Vec<Located<'a>> {
        let mut found = Vec::new();
        let mut path: Vec<&'a str> = Vec::new();
        // (element, depth of its parent path) in pre-order.
        let mut pending: Vec<(&'a Element, usize)> = vec![(&self.root, 0)];
        while let Some((element, depth)) = pending.pop() {
            path.truncate(depth);
            path.push(element.local_name.as_str());
            if element.local_name == local_name {
                found.push(Located {
                    element,
                    path: path.clone(),
                });
            }
            for child in element.children.iter().rev() {
                pending.push((child, depth + 1));
            }
        }
        found
    }

    /// True if any element has the local name `local_name`.
    pub fn contains_local_name(&self, local_name: &str) -> bool {
        let mut pending = vec![&self.root];
        while let Some(element) = pending.pop() {
            if element.local_name == local_name {
                return true;
            }
            pending.extend(element.children.iter());
        }
        false
    }

    /// Distinct local names of the root's direct children, in document order.
    pub fn root_child_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for child in &self.root.children {
            if !names.contains(&child.local_name.as_str()) {
                names.push(child.local_name.as_str());
            }
        }
        names
    }

    /// Re-serialize the tree as compact XML text.
    ///
    /// Text is written before child elements, so mixed content may be
    /// reordered.
    pub fn to_xml(&self) -> Result<String, String> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, &self.root)?;
        String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, root: &Element) -> Result<(), String> {
    // Each entry is an element whose start tag is written and the index of
    // its next child to write.
    let mut open: Vec<(&Element, usize)> = Vec::new();
    let mut next = Some(root);
    loop {
        if let Some(element) = next.take() {
            let mut start = BytesStart::new(element.name.as_str());
            for (key, value) in &element.attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }
            if element.children.is_empty() && element.text.is_empty() {
                writer
                    .write_event(Event::Empty(start))
                    .map_err(|e| e.to_string())?;
            } else {
                writer
                    .write_event(Event::Start(start))
                    .map_err(|e| e.to_string())?;
                if !element.text.is_empty() {
                    writer
                        .write_event(Event::Text(BytesText::new(&element.text)))
                        .map_err(|e| e.to_string())?;
                }
                open.push((element, 0));
            }
        }
        let Some(top) = open.last_mut() else {
            return Ok(());
        };
        let element: &Element = top.0;
        match element.children.get(top.1) {
            Some(child) => {
                top.1 += 1;
                next = Some(child);
            }
            None => {
                writer
                    .write_event(Event::End(BytesEnd::new(element.name.as_str())))
                    .map_err(|e| e.to_string())?;
                open.pop();
            }
        }
    }
}
