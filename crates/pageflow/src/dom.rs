//! In-process document model.
//!
//! The recorder observes documents through cheap cloneable [`Element`] handles,
//! the same way an automation layer wraps a live UI tree. Nodes are `Arc`-backed
//! with `Weak` parent links, so dropping a subtree makes it collectible even
//! while selector caches still hold weak handles to it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::errors::{RecorderError, Result};
use crate::flow::Offset;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a browsing context (one per document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(u64);

/// Represents a rectangle in page coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

struct ElementInner {
    node: u64,
    tag: String,
    is_shadow_root: bool,
    attrs: Mutex<BTreeMap<String, String>>,
    text: Mutex<String>,
    value: Mutex<String>,
    checked: Mutex<bool>,
    scroll: Mutex<Offset>,
    rect: Mutex<Rect>,
    parent: Mutex<Weak<ElementInner>>,
    children: Mutex<Vec<Element>>,
    shadow: Mutex<Option<Element>>,
    content: Mutex<Option<Document>>,
    document: Mutex<Weak<DocumentInner>>,
}

/// A handle to one element of a document tree.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

/// A non-owning element handle, used by caches and pending state.
#[derive(Clone)]
pub struct WeakElement(Weak<ElementInner>);

impl WeakElement {
    pub fn upgrade(&self) -> Option<Element> {
        self.0.upgrade().map(|inner| Element { inner })
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("node", &self.inner.node)
            .field("tag", &self.inner.tag)
            .finish()
    }
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self::build(tag, false)
    }

    fn build(tag: &str, is_shadow_root: bool) -> Self {
        Element {
            inner: Arc::new(ElementInner {
                node: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
                tag: tag.to_ascii_lowercase(),
                is_shadow_root,
                attrs: Mutex::new(BTreeMap::new()),
                text: Mutex::new(String::new()),
                value: Mutex::new(String::new()),
                checked: Mutex::new(false),
                scroll: Mutex::new(Offset::default()),
                rect: Mutex::new(Rect::default()),
                parent: Mutex::new(Weak::new()),
                children: Mutex::new(Vec::new()),
                shadow: Mutex::new(None),
                content: Mutex::new(None),
                document: Mutex::new(Weak::new()),
            }),
        }
    }

    /// Process-unique node identity, stable for the life of the element.
    pub fn node_id(&self) -> u64 {
        self.inner.node
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn is_shadow_root(&self) -> bool {
        self.inner.is_shadow_root
    }

    pub fn same(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakElement {
        WeakElement(Arc::downgrade(&self.inner))
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.inner.attrs.lock().unwrap().get(name).cloned()
    }

    pub fn set_attr(&self, name: &str, value: &str) -> &Self {
        self.inner
            .attrs
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn remove_attr(&self, name: &str) {
        self.inner.attrs.lock().unwrap().remove(name);
    }

    /// The `id` attribute, when present and non-empty.
    pub fn id_attr(&self) -> Option<String> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    pub fn classes(&self) -> Vec<String> {
        self.attr("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Own text content (excludes descendants).
    pub fn text(&self) -> String {
        self.inner.text.lock().unwrap().clone()
    }

    pub fn set_text(&self, text: &str) -> &Self {
        *self.inner.text.lock().unwrap() = text.to_string();
        self
    }

    /// Visible text: own text plus light-DOM descendant text, whitespace-joined.
    pub fn inner_text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        parts.join(" ")
    }

    fn collect_text(&self, out: &mut Vec<String>) {
        let own = self.text();
        if !own.trim().is_empty() {
            out.push(own.trim().to_string());
        }
        for child in self.children() {
            child.collect_text(out);
        }
    }

    pub fn value(&self) -> String {
        self.inner.value.lock().unwrap().clone()
    }

    pub fn set_value(&self, value: &str) -> &Self {
        *self.inner.value.lock().unwrap() = value.to_string();
        self
    }

    pub fn checked(&self) -> bool {
        *self.inner.checked.lock().unwrap()
    }

    pub fn set_checked(&self, checked: bool) -> &Self {
        *self.inner.checked.lock().unwrap() = checked;
        self
    }

    pub fn scroll_offset(&self) -> Offset {
        *self.inner.scroll.lock().unwrap()
    }

    pub fn set_scroll_offset(&self, x: f64, y: f64) -> &Self {
        *self.inner.scroll.lock().unwrap() = Offset { x, y };
        self
    }

    pub fn set_rect(&self, rect: Rect) -> &Self {
        *self.inner.rect.lock().unwrap() = rect;
        self
    }

    /// Page-coordinate bounds. Fails for detached elements, the way a layout
    /// query raises on a node that left the tree.
    pub fn bounding_rect(&self) -> Result<Rect> {
        if !self.attached() {
            return Err(RecorderError::ElementDetached(self.inner.tag.clone()));
        }
        Ok(*self.inner.rect.lock().unwrap())
    }

    pub fn parent(&self) -> Option<Element> {
        self.inner
            .parent
            .lock()
            .unwrap()
            .upgrade()
            .map(|inner| Element { inner })
    }

    pub fn children(&self) -> Vec<Element> {
        self.inner.children.lock().unwrap().clone()
    }

    pub fn append_child(&self, child: &Element) -> &Self {
        *child.inner.parent.lock().unwrap() = Arc::downgrade(&self.inner);
        self.inner.children.lock().unwrap().push(child.clone());
        if let Some(doc) = self.document() {
            child.adopt(&doc);
        }
        self
    }

    /// Removes this element from its parent's child list.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent
                .inner
                .children
                .lock()
                .unwrap()
                .retain(|c| !c.same(self));
        }
        *self.inner.parent.lock().unwrap() = Weak::new();
    }

    fn adopt(&self, doc: &Document) {
        *self.inner.document.lock().unwrap() = Arc::downgrade(&doc.inner);
        for child in self.children() {
            child.adopt(doc);
        }
        if let Some(shadow) = self.shadow_root() {
            shadow.adopt(doc);
        }
    }

    /// Attaches (or returns the existing) shadow root container.
    pub fn attach_shadow(&self) -> Element {
        let mut slot = self.inner.shadow.lock().unwrap();
        if let Some(existing) = slot.as_ref() {
            return existing.clone();
        }
        let root = Element::build("#shadow-root", true);
        *root.inner.parent.lock().unwrap() = Arc::downgrade(&self.inner);
        if let Some(doc) = self.document() {
            root.adopt(&doc);
        }
        *slot = Some(root.clone());
        root
    }

    pub fn shadow_root(&self) -> Option<Element> {
        self.inner.shadow.lock().unwrap().clone()
    }

    /// For `iframe`/`frame` elements: the nested document.
    pub fn set_content_document(&self, doc: &Document) -> &Self {
        *self.inner.content.lock().unwrap() = Some(doc.clone());
        self
    }

    pub fn content_document(&self) -> Option<Document> {
        self.inner.content.lock().unwrap().clone()
    }

    pub fn document(&self) -> Option<Document> {
        self.inner
            .document
            .lock()
            .unwrap()
            .upgrade()
            .map(|inner| Document { inner })
    }

    /// Root of the tree scope this element lives in: the shadow root container
    /// for shadow trees, otherwise the topmost parentless ancestor.
    pub fn root(&self) -> Element {
        let mut cur = self.clone();
        loop {
            if cur.is_shadow_root() {
                return cur;
            }
            match cur.parent() {
                Some(p) => cur = p,
                None => return cur,
            }
        }
    }

    /// Whether the element is connected to its document's body, crossing
    /// shadow boundaries through the host chain.
    pub fn attached(&self) -> bool {
        let mut cur = self.clone();
        loop {
            let root = cur.root();
            if root.is_shadow_root() {
                match root.parent() {
                    Some(host) => cur = host,
                    None => return false,
                }
            } else {
                return match root.document() {
                    Some(doc) => doc.body().same(&root),
                    None => false,
                };
            }
        }
    }

    /// The event path from this element to the document root. Shadow root
    /// containers appear on the path and are followed by their host.
    pub fn composed_path(&self) -> Vec<Element> {
        let mut path = vec![self.clone()];
        let mut cur = self.clone();
        while let Some(p) = cur.parent() {
            path.push(p.clone());
            cur = p;
        }
        path
    }

    /// All light-DOM descendants including self. Shadow trees and frame
    /// content documents are not traversed.
    pub fn subtree(&self) -> Vec<Element> {
        let mut out = Vec::new();
        self.collect_subtree(&mut out);
        out
    }

    fn collect_subtree(&self, out: &mut Vec<Element>) {
        out.push(self.clone());
        for child in self.children() {
            child.collect_subtree(out);
        }
    }

    /// 1-based position among same-tag siblings, as `:nth-of-type` counts.
    pub fn nth_of_type(&self) -> usize {
        match self.parent() {
            Some(parent) => {
                let mut n = 0;
                for sibling in parent.children() {
                    if sibling.tag() == self.tag() {
                        n += 1;
                    }
                    if sibling.same(self) {
                        break;
                    }
                }
                n.max(1)
            }
            None => 1,
        }
    }

    /// Number of same-tag siblings, self included.
    pub fn same_tag_sibling_count(&self) -> usize {
        match self.parent() {
            Some(parent) => parent
                .children()
                .iter()
                .filter(|c| c.tag() == self.tag())
                .count(),
            None => 1,
        }
    }
}

struct DocumentInner {
    window: WindowId,
    origin: String,
    href: Mutex<String>,
    body: Element,
    scroll: Mutex<Offset>,
    focused: Mutex<Weak<ElementInner>>,
    recorder_installed: AtomicBool,
}

/// A handle to one document (one per frame).
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("window", &self.inner.window)
            .field("href", &self.href())
            .finish()
    }
}

impl Document {
    pub fn new(href: &str) -> Self {
        let body = Element::new("body");
        let doc = Document {
            inner: Arc::new(DocumentInner {
                window: WindowId(NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed)),
                origin: derive_origin(href),
                href: Mutex::new(href.to_string()),
                body: body.clone(),
                scroll: Mutex::new(Offset::default()),
                focused: Mutex::new(Weak::new()),
                recorder_installed: AtomicBool::new(false),
            }),
        };
        body.adopt(&doc);
        doc
    }

    pub fn window_id(&self) -> WindowId {
        self.inner.window
    }

    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    pub fn href(&self) -> String {
        self.inner.href.lock().unwrap().clone()
    }

    pub fn set_href(&self, href: &str) {
        *self.inner.href.lock().unwrap() = href.to_string();
    }

    pub fn body(&self) -> Element {
        self.inner.body.clone()
    }

    pub fn scroll_offset(&self) -> Offset {
        *self.inner.scroll.lock().unwrap()
    }

    pub fn set_scroll_offset(&self, x: f64, y: f64) {
        *self.inner.scroll.lock().unwrap() = Offset { x, y };
    }

    /// Moves focus. Pass the innermost element for shadow-tree focus; the
    /// document-level view retargets to the host.
    pub fn set_focus(&self, el: Option<&Element>) {
        *self.inner.focused.lock().unwrap() = match el {
            Some(el) => Arc::downgrade(&el.inner),
            None => Weak::new(),
        };
    }

    /// The focused element as visible from the document tree (shadow-tree
    /// focus retargets to the host element).
    pub fn active_element(&self) -> Option<Element> {
        let mut el = self.deep_active_element()?;
        loop {
            let root = el.root();
            if root.is_shadow_root() {
                el = root.parent()?;
            } else {
                return Some(el);
            }
        }
    }

    /// The innermost focused element, descending through shadow roots.
    pub fn deep_active_element(&self) -> Option<Element> {
        self.inner
            .focused
            .lock()
            .unwrap()
            .upgrade()
            .map(|inner| Element { inner })
    }

    /// All `iframe`/`frame` elements of the light tree.
    pub fn frame_elements(&self) -> Vec<Element> {
        self.body()
            .subtree()
            .into_iter()
            .filter(|el| matches!(el.tag(), "iframe" | "frame"))
            .collect()
    }

    /// Marks the recorder as installed. Returns `false` when a recorder was
    /// already installed, making repeated injection a safe no-op.
    pub fn mark_recorder_installed(&self) -> bool {
        !self.inner.recorder_installed.swap(true, Ordering::SeqCst)
    }

    pub fn recorder_installed(&self) -> bool {
        self.inner.recorder_installed.load(Ordering::SeqCst)
    }
}

fn derive_origin(href: &str) -> String {
    match url::Url::parse(href) {
        Ok(u) => u.origin().ascii_serialization(),
        Err(_) => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_derivation() {
        let doc = Document::new("https://example.com/page?q=1");
        assert_eq!(doc.origin(), "https://example.com");
        let opaque = Document::new("not a url");
        assert_eq!(opaque.origin(), "null");
    }

    #[test]
    fn test_attach_and_detach() {
        let doc = Document::new("https://example.com/");
        let div = Element::new("div");
        doc.body().append_child(&div);
        assert!(div.attached());
        assert!(div.document().is_some());

        div.detach();
        assert!(!div.attached());
        assert!(div.bounding_rect().is_err());
    }

    #[test]
    fn test_shadow_root_scoping() {
        let doc = Document::new("https://example.com/");
        let host = Element::new("div");
        doc.body().append_child(&host);
        let shadow = host.attach_shadow();
        let input = Element::new("input");
        shadow.append_child(&input);

        assert!(input.root().is_shadow_root());
        assert!(input.attached());

        doc.set_focus(Some(&input));
        assert!(doc.deep_active_element().unwrap().same(&input));
        assert!(doc.active_element().unwrap().same(&host));
    }

    #[test]
    fn test_nth_of_type_counts_same_tag_only() {
        let doc = Document::new("https://example.com/");
        let body = doc.body();
        let span = Element::new("span");
        let div1 = Element::new("div");
        let div2 = Element::new("div");
        body.append_child(&span);
        body.append_child(&div1);
        body.append_child(&div2);

        assert_eq!(div1.nth_of_type(), 1);
        assert_eq!(div2.nth_of_type(), 2);
        assert_eq!(span.nth_of_type(), 1);
        assert_eq!(div2.same_tag_sibling_count(), 2);
    }

    #[test]
    fn test_weak_handle_collectible() {
        let doc = Document::new("https://example.com/");
        let weak = {
            let div = Element::new("div");
            doc.body().append_child(&div);
            let w = div.downgrade();
            div.detach();
            w
        };
        assert!(weak.upgrade().is_none());
    }
}
