// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Tree of framework elements, guarded by the runtime's structural lock.
//!
//! Elements live in a slab indexed by [`ElementId`]; children keep their
//! creation order, so every traversal here is deterministic.

use std::sync::Arc;

use super::element::{Element, ElementFlags, ElementId, ElementKind};
use crate::core::ports::Port;
use crate::core::{FlowError, Result};

#[derive(Debug)]
pub struct ElementTree {
    elements: Vec<Option<Element>>,
    live: usize,
}

impl ElementTree {
    pub fn new() -> Self {
        let root = Element {
            id: ElementId::ROOT,
            name: String::new(),
            parent: None,
            children: Vec::new(),
            flags: ElementFlags::READY,
            kind: ElementKind::Group,
        };
        Self {
            elements: vec![Some(root)],
            live: 1,
        }
    }

    /// Number of live elements, root included.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Id the next inserted element will get.
    pub(crate) fn next_id(&self) -> ElementId {
        ElementId::new(self.elements.len() as u32)
    }

    pub(crate) fn insert(
        &mut self,
        parent: ElementId,
        name: &str,
        flags: ElementFlags,
        kind: ElementKind,
    ) -> Result<ElementId> {
        self.check_new_child(parent, name)?;
        let id = self.next_id();
        self.elements.push(Some(Element {
            id,
            name: name.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            flags: flags - ElementFlags::READY,
            kind,
        }));
        self.live += 1;
        if let Some(parent) = self.get_mut(parent) {
            parent.children.push(id);
        }
        Ok(id)
    }

    /// Validate a child name before anything is built for it.
    pub(crate) fn check_new_child(&self, parent: ElementId, name: &str) -> Result<()> {
        let parent_element = self.element(parent)?;
        if matches!(parent_element.kind, ElementKind::Port(_) | ElementKind::Task(_)) {
            return Err(FlowError::InvalidElement(format!(
                "{} '{}' cannot have children",
                parent_element.kind.label(),
                self.path(parent)
            )));
        }
        if name.is_empty() || name.contains('/') {
            return Err(FlowError::InvalidElement(format!(
                "invalid element name '{}'",
                name
            )));
        }
        if self.find_child(parent, name).is_some() {
            return Err(FlowError::InvalidElement(format!(
                "'{}' already has a child named '{}'",
                self.path(parent),
                name
            )));
        }
        Ok(())
    }

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn element(&self, id: ElementId) -> Result<&Element> {
        self.get(id)
            .ok_or_else(|| FlowError::ElementNotFound(id.to_string()))
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.get(id).is_some()
    }

    /// Live elements in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().flatten()
    }

    pub fn port(&self, id: ElementId) -> Result<&Arc<Port>> {
        self.element(id)?.as_port().ok_or_else(|| {
            FlowError::InvalidElement(format!("'{}' is not a port", self.path(id)))
        })
    }

    pub fn ports(&self) -> impl Iterator<Item = &Arc<Port>> {
        self.iter().filter_map(Element::as_port)
    }

    pub fn find_child(&self, parent: ElementId, name: &str) -> Option<ElementId> {
        self.get(parent)?
            .children
            .iter()
            .copied()
            .find(|child| self.get(*child).is_some_and(|e| e.name == name))
    }

    /// Qualified name, `/`-separated from the root.
    pub fn path(&self, id: ElementId) -> String {
        let mut names = Vec::new();
        let mut cursor = self.get(id);
        while let Some(element) = cursor {
            if element.id == ElementId::ROOT {
                break;
            }
            names.push(element.name.as_str());
            cursor = element.parent.and_then(|parent| self.get(parent));
        }
        if names.is_empty() {
            return "/".to_string();
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    pub fn lookup(&self, path: &str) -> Option<ElementId> {
        let mut current = ElementId::ROOT;
        for name in path.split('/').filter(|segment| !segment.is_empty()) {
            current = self.find_child(current, name)?;
        }
        Some(current)
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut ancestors = Vec::new();
        let mut cursor = self.get(id).and_then(|element| element.parent);
        while let Some(parent) = cursor {
            ancestors.push(parent);
            cursor = self.get(parent).and_then(|element| element.parent);
        }
        ancestors
    }

    pub fn is_descendant_of(&self, id: ElementId, ancestor: ElementId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    /// `id` and everything below it, in pre-order.
    pub fn subtree(&self, id: ElementId) -> Vec<ElementId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(element) = self.get(current) else {
                continue;
            };
            result.push(current);
            stack.extend(element.children.iter().rev().copied());
        }
        result
    }

    /// Closest ancestor flagged as edge aggregator.
    pub fn nearest_aggregator(&self, id: ElementId) -> Option<ElementId> {
        self.ancestors(id).into_iter().find(|ancestor| {
            self.get(*ancestor)
                .is_some_and(|e| e.flags.contains(ElementFlags::EDGE_AGGREGATOR))
        })
    }

    /// Closest ancestor that is a thread container.
    pub fn owning_container(&self, id: ElementId) -> Option<ElementId> {
        self.ancestors(id).into_iter().find(|ancestor| {
            self.get(*ancestor)
                .is_some_and(|e| e.flags.contains(ElementFlags::THREAD_CONTAINER))
        })
    }

    /// Mark `id` and its subtree ready. Returns the newly ready elements.
    pub(crate) fn set_ready(&mut self, id: ElementId) -> Result<Vec<ElementId>> {
        self.element(id)?;
        let mut initialised = Vec::new();
        for element_id in self.subtree(id) {
            if let Some(element) = self.get_mut(element_id) {
                if !element.flags.contains(ElementFlags::READY) {
                    element.flags.insert(ElementFlags::READY);
                    if let ElementKind::Port(port) = &element.kind {
                        port.set_ready();
                    }
                    initialised.push(element_id);
                }
            }
        }
        Ok(initialised)
    }

    /// Unlink `id` and its subtree. Returns the removed elements, pre-order.
    pub(crate) fn remove(&mut self, id: ElementId) -> Result<Vec<Element>> {
        if id == ElementId::ROOT {
            return Err(FlowError::InvalidElement(
                "the root element cannot be removed".into(),
            ));
        }
        let parent = self.element(id)?.parent;
        if let Some(parent) = parent.and_then(|parent| self.get_mut(parent)) {
            parent.children.retain(|child| *child != id);
        }
        let mut removed = Vec::new();
        for element_id in self.subtree(id) {
            if let Some(element) = self.elements[element_id.index()].take() {
                removed.push(element);
            }
        }
        self.live -= removed.len();
        Ok(removed)
    }
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}
