//! Selector generation.
//!
//! Given an element, the engine produces a stable, human-readable primary
//! selector plus alternatives in priority order (`attr` > `css` > `aria` >
//! `text`). Expensive lookups (unique-class search, structural paths) are
//! memoized per document behind weak handles, so long-lived pages do not pin
//! detached elements.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::css::{self, attr_escape, css_escape};
use crate::dom::{Document, Element, WeakElement};
use crate::flow::{Candidate, CandidateKind, Target};

const TEST_ATTRIBUTES: [&str; 4] = ["data-testid", "data-test", "data-qa", "data-cy"];
const NAMED_ATTRIBUTES: [&str; 3] = ["name", "title", "alt"];
const TEXT_CANDIDATE_TAGS: [&str; 3] = ["button", "a", "summary"];
const FORM_CONTROL_TAGS: [&str; 3] = ["input", "textarea", "select"];
const MAX_TEXT_CANDIDATE_LEN: usize = 64;
const CACHE_PURGE_THRESHOLD: usize = 256;

struct CacheEntry {
    el: WeakElement,
    selector: Option<String>,
}

struct RefAllocator {
    next: u64,
    by_node: HashMap<u64, (WeakElement, String)>,
}

/// Per-document selector engine. All methods are total: on any anomaly the
/// result degrades to the structural path, it never errors.
pub struct SelectorEngine {
    doc: Document,
    class_cache: Mutex<HashMap<u64, CacheEntry>>,
    path_cache: Mutex<HashMap<u64, CacheEntry>>,
    refs: Mutex<RefAllocator>,
}

impl SelectorEngine {
    pub fn new(doc: &Document) -> Self {
        SelectorEngine {
            doc: doc.clone(),
            class_cache: Mutex::new(HashMap::new()),
            path_cache: Mutex::new(HashMap::new()),
            refs: Mutex::new(RefAllocator {
                next: 0,
                by_node: HashMap::new(),
            }),
        }
    }

    /// Builds the target description for an element: primary selector,
    /// candidate alternatives and tag. The recording `ref` is not assigned
    /// here; callers attach one via [`SelectorEngine::ref_for`].
    pub fn build_target(&self, el: &Element) -> Target {
        let tag = el.tag().to_string();

        let mut attr_values = Vec::new();
        for name in TEST_ATTRIBUTES.iter().chain(NAMED_ATTRIBUTES.iter()) {
            if let Some(value) = el.attr(name).filter(|v| !v.is_empty()) {
                attr_values.push(self.attr_selector(el, name, &value));
            }
        }

        let class_selector = self.unique_class_selector(el);
        let path_selector = self.structural_path(el);

        let mut candidates = Vec::new();
        for value in &attr_values {
            candidates.push(Candidate {
                kind: CandidateKind::Attr,
                value: value.clone(),
            });
        }
        if let Some(class_sel) = &class_selector {
            candidates.push(Candidate {
                kind: CandidateKind::Css,
                value: class_sel.clone(),
            });
        }
        candidates.push(Candidate {
            kind: CandidateKind::Css,
            value: path_selector.clone(),
        });
        if let Some(aria) = aria_candidate(el) {
            candidates.push(Candidate {
                kind: CandidateKind::Aria,
                value: aria,
            });
        }
        if let Some(text) = text_candidate(el) {
            candidates.push(Candidate {
                kind: CandidateKind::Text,
                value: text,
            });
        }

        let selector = self
            .id_selector(el)
            .or_else(|| attr_values.first().cloned())
            .or(class_selector)
            .unwrap_or_else(|| path_selector.clone());

        Target {
            selector,
            candidates,
            tag,
            elem_ref: None,
        }
    }

    /// `#id` when the id is unique in the element's tree scope.
    fn id_selector(&self, el: &Element) -> Option<String> {
        let id = el.id_attr()?;
        let selector = format!("#{}", css_escape(&id));
        self.is_unique(el, &selector).then_some(selector)
    }

    fn attr_selector(&self, el: &Element, name: &str, value: &str) -> String {
        let prefix = if FORM_CONTROL_TAGS.contains(&el.tag()) {
            el.tag()
        } else {
            ""
        };
        format!("{prefix}[{name}=\"{}\"]", attr_escape(value))
    }

    /// First class-based selector that uniquely matches: a single class, then
    /// `tag.class`, then two-class combinations over the first three classes.
    fn unique_class_selector(&self, el: &Element) -> Option<String> {
        if let Some(cached) = self.cached(&self.class_cache, el) {
            return cached;
        }

        let classes: Vec<String> = el.classes().into_iter().take(3).collect();
        let mut found = None;

        for class in &classes {
            let selector = format!(".{}", css_escape(class));
            if self.is_unique(el, &selector) {
                found = Some(selector);
                break;
            }
        }
        if found.is_none() {
            for class in &classes {
                let selector = format!("{}.{}", el.tag(), css_escape(class));
                if self.is_unique(el, &selector) {
                    found = Some(selector);
                    break;
                }
            }
        }
        if found.is_none() {
            'outer: for i in 0..classes.len() {
                for j in (i + 1)..classes.len() {
                    let selector =
                        format!(".{}.{}", css_escape(&classes[i]), css_escape(&classes[j]));
                    if self.is_unique(el, &selector) {
                        found = Some(selector);
                        break 'outer;
                    }
                }
            }
        }

        self.store(&self.class_cache, el, found.clone());
        found
    }

    /// Structural fallback: from the tree-scope root down, tag names with
    /// `:nth-of-type(n)` only where same-tag siblings exist.
    fn structural_path(&self, el: &Element) -> String {
        if let Some(Some(cached)) = self.cached(&self.path_cache, el) {
            return cached;
        }

        let mut segments = Vec::new();
        let mut cur = el.clone();
        loop {
            if cur.is_shadow_root() {
                break;
            }
            if cur.tag() == "body" && cur.parent().is_none() {
                segments.push("body".to_string());
                break;
            }
            let mut segment = cur.tag().to_string();
            if cur.same_tag_sibling_count() > 1 {
                segment.push_str(&format!(":nth-of-type({})", cur.nth_of_type()));
            }
            segments.push(segment);
            match cur.parent() {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        segments.reverse();
        let path = segments.join(" > ");

        self.store(&self.path_cache, el, Some(path.clone()));
        path
    }

    fn is_unique(&self, el: &Element, selector: &str) -> bool {
        let Ok(path) = css::parse(selector) else {
            debug!(selector, "generated selector failed to parse");
            return false;
        };
        let scope = el.root();
        let matches = css::select_all(&scope, &path);
        matches.len() == 1 && matches[0].same(el)
    }

    fn cached(
        &self,
        cache: &Mutex<HashMap<u64, CacheEntry>>,
        el: &Element,
    ) -> Option<Option<String>> {
        let cache = cache.lock().unwrap();
        let entry = cache.get(&el.node_id())?;
        let live = entry.el.upgrade()?;
        live.same(el).then(|| entry.selector.clone())
    }

    fn store(&self, cache: &Mutex<HashMap<u64, CacheEntry>>, el: &Element, selector: Option<String>) {
        let mut cache = cache.lock().unwrap();
        if cache.len() >= CACHE_PURGE_THRESHOLD {
            cache.retain(|_, entry| entry.el.upgrade().is_some());
        }
        cache.insert(
            el.node_id(),
            CacheEntry {
                el: el.downgrade(),
                selector,
            },
        );
    }

    /// The opaque per-document recording ref for an element, allocated on
    /// first use (`ref_0`, `ref_1`, ...).
    pub fn ref_for(&self, el: &Element) -> String {
        let mut refs = self.refs.lock().unwrap();
        if let Some((weak, token)) = refs.by_node.get(&el.node_id()) {
            if weak.upgrade().is_some_and(|live| live.same(el)) {
                return token.clone();
            }
        }
        if refs.by_node.len() >= CACHE_PURGE_THRESHOLD {
            refs.by_node.retain(|_, (weak, _)| weak.upgrade().is_some());
        }
        let token = format!("ref_{}", refs.next);
        refs.next += 1;
        refs.by_node
            .insert(el.node_id(), (el.downgrade(), token.clone()));
        token
    }

    /// Resolves a recording ref back to its element, when still alive.
    pub fn resolve_ref(&self, token: &str) -> Option<Element> {
        let refs = self.refs.lock().unwrap();
        refs.by_node
            .values()
            .find(|(_, t)| t == token)
            .and_then(|(weak, _)| weak.upgrade())
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }
}

fn aria_candidate(el: &Element) -> Option<String> {
    let label = el.attr("aria-label").filter(|l| !l.is_empty())?;
    let role = el
        .attr("role")
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "textbox".to_string());
    Some(format!("{role}[name=\"{}\"]", attr_escape(&label)))
}

fn text_candidate(el: &Element) -> Option<String> {
    if !TEXT_CANDIDATE_TAGS.contains(&el.tag()) {
        return None;
    }
    let text = el.inner_text();
    let text = text.trim();
    (!text.is_empty() && text.len() <= MAX_TEXT_CANDIDATE_LEN).then(|| text.to_string())
}
