//! Markup to blueprint compilation.

use tempera_armature::parse_with_options;
use tempera_carton::{hash::hash_str, is_template_tag, smallvec, CompactString, SmallVec};
use tempera_relief::{ElementNode, MarkerNode, MarkupNode, PropNode};

use super::syntax::{self, ExpressionSource};
use super::{BlueprintId, BlueprintNode, MarkerArg, MarkerDescriptor, Templates};
use crate::error::{Error, Result};
use crate::markers::MarkerRegistry;

/// Bindings collected while walking one blueprint in pre-order.
#[derive(Default)]
struct Bindings {
    counter: u32,
    table: Vec<(u32, SmallVec<[MarkerDescriptor; 2]>)>,
}

impl Bindings {
    fn next_index(&mut self) -> u32 {
        let index = self.counter;
        self.counter += 1;
        index
    }

    fn bind(&mut self, index: u32, descriptor: MarkerDescriptor) {
        match self.table.last_mut() {
            Some((last, list)) if *last == index => list.push(descriptor),
            _ => self.table.push((index, smallvec![descriptor])),
        }
    }
}

impl Templates {
    /// Compile `source` into a blueprint.
    ///
    /// Identical sources compile once; later calls return the cached id.
    pub fn compile(&mut self, source: &str, markers: &MarkerRegistry) -> Result<BlueprintId> {
        let hash = hash_str(source);
        if let Some(&id) = self.cache.get(&hash) {
            tracing::trace!(blueprint = id.0, "blueprint cache hit");
            return Ok(id);
        }

        let (root, errors) = parse_with_options(source, self.options.clone());
        if let Some(error) = errors.into_iter().next() {
            return Err(error.into());
        }

        let mark = self.blueprints.len();
        let id = self.reserve(None);
        if let Err(err) = self.compile_into(id, &root.children, markers) {
            self.blueprints.truncate(mark);
            self.names.retain(|_, named| (named.0 as usize) < mark);
            return Err(err);
        }
        self.cache.insert(hash, id);

        tracing::debug!(
            blueprint = id.0,
            blueprints = self.blueprints.len() - mark,
            paths = self.paths.len(),
            "compiled template"
        );
        Ok(id)
    }

    fn compile_into(
        &mut self,
        id: BlueprintId,
        nodes: &[MarkupNode],
        markers: &MarkerRegistry,
    ) -> Result<()> {
        let mut bindings = Bindings::default();
        let mut compiled = Vec::with_capacity(nodes.len());
        for node in nodes {
            compiled.push(self.compile_node(node, &mut bindings, markers)?);
        }
        let blueprint = &mut self.blueprints[id.0 as usize];
        blueprint.nodes = compiled;
        blueprint.bindings = bindings.table;
        Ok(())
    }

    fn compile_node(
        &mut self,
        node: &MarkupNode,
        bindings: &mut Bindings,
        markers: &MarkerRegistry,
    ) -> Result<BlueprintNode> {
        let index = bindings.next_index();
        match node {
            MarkupNode::Text(text) => Ok(BlueprintNode::Text(text.content.clone())),
            MarkupNode::Comment(comment) => Ok(BlueprintNode::Comment(comment.content.clone())),
            MarkupNode::Interpolation(interpolation) => {
                let descriptor = syntax::parse_expression(&interpolation.content, self.sentinel)
                    .and_then(|expression| self.descriptor("text", expression, SmallVec::new()))
                    .map_err(|err| {
                        let (open, close) = &self.options.delimiters;
                        err.at_node(format!("{open} {} {close}", interpolation.content))
                    })?;
                bindings.bind(index, descriptor);
                Ok(BlueprintNode::Text(CompactString::default()))
            }
            MarkupNode::Element(element) => self
                .compile_element(element, index, bindings, markers)
                .map_err(|err| err.at_node(element.opening_tag())),
        }
    }

    fn compile_element(
        &mut self,
        element: &ElementNode,
        index: u32,
        bindings: &mut Bindings,
        markers: &MarkerRegistry,
    ) -> Result<BlueprintNode> {
        let structural = element.props.iter().enumerate().find_map(|(i, prop)| match prop {
            PropNode::Marker(marker) if markers.is_structural(&marker.name) => Some((i, marker)),
            _ => None,
        });
        if let Some((position, marker)) = structural {
            return self.compile_structural(element, position, marker, index, bindings, markers);
        }

        if is_template_tag(&element.tag) {
            if let Some(name) = element.attribute("id") {
                let id = self.reserve(Some(name));
                self.compile_into(id, &element.children, markers)?;
                return Ok(BlueprintNode::Anchor(format!("template {name}").into()));
            }
        }

        let mut attributes = Vec::new();
        for prop in &element.props {
            match prop {
                PropNode::Attribute(attr) => {
                    attributes.push((attr.name.clone(), attr.value.clone().unwrap_or_default()));
                }
                PropNode::Marker(marker) => {
                    if !markers.contains(&marker.name) {
                        return Err(Error::reference(format!(
                            "unknown marker '{}'",
                            marker.raw_name
                        )));
                    }
                    for pair in syntax::parse_binding(binding_text(marker)?, self.sentinel)? {
                        let mut args = SmallVec::new();
                        if let Some(arg) = marker.arg.clone().or(pair.arg) {
                            args.push(MarkerArg::Name(arg));
                        }
                        let descriptor = self.descriptor(&marker.name, pair.expression, args)?;
                        bindings.bind(index, descriptor);
                    }
                }
            }
        }

        let mut children = Vec::with_capacity(element.children.len());
        for child in &element.children {
            children.push(self.compile_node(child, bindings, markers)?);
        }
        Ok(BlueprintNode::Element {
            tag: element.tag.clone(),
            attributes,
            children,
        })
    }

    fn compile_structural(
        &mut self,
        element: &ElementNode,
        position: usize,
        marker: &MarkerNode,
        index: u32,
        bindings: &mut Bindings,
        markers: &MarkerRegistry,
    ) -> Result<BlueprintNode> {
        let mut pairs = syntax::parse_binding(binding_text(marker)?, self.sentinel)?;
        if pairs.len() != 1 {
            return Err(Error::syntax(format!(
                "'{}' takes exactly one binding",
                marker.raw_name
            )));
        }
        let pair = pairs.remove(0);

        let sub = if is_template_tag(&element.tag) {
            match element.attribute("template") {
                Some(reference) => self
                    .named(reference)
                    .ok_or_else(|| Error::reference(format!("unknown template '{reference}'")))?,
                None => {
                    let id = self.reserve(element.attribute("id"));
                    self.compile_into(id, &element.children, markers)?;
                    id
                }
            }
        } else {
            let mut stripped = element.clone();
            stripped.props.remove(position);
            let id = self.reserve(None);
            self.compile_into(id, &[MarkupNode::Element(Box::new(stripped))], markers)?;
            id
        };

        let mut args: SmallVec<[MarkerArg; 2]> = smallvec![MarkerArg::Blueprint(sub)];
        if let Some(arg) = pair.arg {
            args.push(MarkerArg::Name(arg));
        }
        let descriptor = self.descriptor(&marker.name, pair.expression, args)?;
        bindings.bind(index, descriptor);
        Ok(BlueprintNode::Anchor(marker.name.clone()))
    }

    fn descriptor(
        &mut self,
        marker: &str,
        expression: ExpressionSource,
        args: SmallVec<[MarkerArg; 2]>,
    ) -> Result<MarkerDescriptor> {
        let path = self.intern_path(&expression.path)?;
        Ok(MarkerDescriptor {
            marker: marker.into(),
            path,
            local: expression.local,
            filters: expression.filters,
            args,
        })
    }
}

fn binding_text(marker: &MarkerNode) -> Result<&str> {
    marker
        .value
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| Error::syntax(format!("'{}' needs a binding", marker.raw_name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempera_relief::ParserOptions;

    fn compile(source: &str) -> (Templates, Result<BlueprintId>) {
        let mut templates = Templates::new(ParserOptions::default(), '@');
        let result = templates.compile(source, &MarkerRegistry::with_builtins());
        (templates, result)
    }

    fn describe(templates: &Templates, id: BlueprintId) -> Vec<String> {
        let blueprint = templates.blueprint(id).unwrap();
        blueprint
            .bindings
            .iter()
            .flat_map(|(index, descriptors)| {
                descriptors.iter().map(move |d| {
                    let path = templates.path(d.path).unwrap();
                    let scope = if d.local { "@" } else { "" };
                    format!("{index}: {} {scope}{} {:?}", d.marker, path.raw(), d.args)
                })
            })
            .collect()
    }

    #[test]
    fn test_interpolation_and_markers() {
        let (templates, id) = compile(
            r#"<p *class="active: isActive" .title="label">Hi {{ user.name | upper }}</p>"#,
        );
        let id = id.unwrap();
        insta::assert_debug_snapshot!(describe(&templates, id), @r#"
        [
            "0: class isActive [Name(\"active\")]",
            "0: prop label [Name(\"title\")]",
            "2: text user.name []",
        ]
        "#);
        let blueprint = templates.blueprint(id).unwrap();
        assert_eq!(blueprint.node_count(), 3);
        assert_eq!(blueprint.bindings[1].1[0].filters[0].name, "upper");
    }

    #[test]
    fn test_structural_element_becomes_anchor() {
        let (templates, id) =
            compile(r#"<ul><li *foreach="items" *class="@item.cls">{{ @item.name }}</li></ul>"#);
        let id = id.unwrap();
        let blueprint = templates.blueprint(id).unwrap();
        let BlueprintNode::Element { children, .. } = &blueprint.nodes[0] else {
            panic!("expected element");
        };
        assert!(matches!(&children[0], BlueprintNode::Anchor(label) if label == "foreach"));
        assert_eq!(describe(&templates, id), vec!["1: foreach items [Blueprint(BlueprintId(1))]"]);
        assert_eq!(
            describe(&templates, BlueprintId(1)),
            vec!["0: class @item.cls []", "1: text @item.name []"]
        );
        assert_eq!(templates.root_properties(id), vec!["items"]);
    }

    #[test]
    fn test_template_children_and_nested_structurals() {
        let (templates, id) = compile(
            r#"<template *if="open"><b *if="@item" *foreach="rows">x</b>{{ title }}</template>"#,
        );
        let id = id.unwrap();
        assert_eq!(templates.len(), 4);
        assert_eq!(describe(&templates, id), vec!["0: if open [Blueprint(BlueprintId(1))]"]);
        // `*if` is taken first; the remaining `*foreach` wraps the element again.
        assert_eq!(describe(&templates, BlueprintId(2)), vec!["0: foreach rows [Blueprint(BlueprintId(3))]"]);
        let mut roots = templates.root_properties(id);
        roots.sort();
        assert_eq!(roots, vec!["open", "rows", "title"]);
    }

    #[test]
    fn test_named_template_recursion() {
        let (templates, id) = compile(
            r#"<template id="tree" *foreach="nodes"><li>{{ @item.name }}<ul><template *foreach="@item.children" template="tree"></template></ul></li></template>"#,
        );
        let id = id.unwrap();
        let tree = templates.named("tree").unwrap();
        let inner = describe(&templates, tree);
        assert_eq!(inner.last().unwrap(), &format!("3: foreach @item.children [Blueprint({tree:?})]"));
        assert_eq!(templates.root_properties(id), vec!["nodes"]);
    }

    #[test]
    fn test_unknown_template_reference() {
        let (templates, result) = compile(r#"<template *if="a" template="nope"></template>"#);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(err.node_tag(), Some(r#"<template *if="a" template="nope">"#));
        assert!(templates.is_empty());
    }

    #[test]
    fn test_unknown_marker() {
        let (_, result) = compile(r#"<div><span *shout="x"></span></div>"#);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(err.node_tag(), Some(r#"<span *shout="x">"#));
    }

    #[test]
    fn test_bad_path_is_syntax_error() {
        let (_, result) = compile(r#"<p>{{ a..b }}</p>"#);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_markup_error() {
        let (_, result) = compile("<div>{{ open");
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Markup);
    }

    #[test]
    fn test_cache_and_path_interning() {
        let mut templates = Templates::new(ParserOptions::default(), '@');
        let markers = MarkerRegistry::with_builtins();
        let source = r#"<p *attr="title: name">{{ name }}</p>"#;
        let first = templates.compile(source, &markers).unwrap();
        let second = templates.compile(source, &markers).unwrap();
        assert_eq!(first, second);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates.path_count(), 1);
    }
}
