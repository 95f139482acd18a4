//! Static knowledge about HTML tags.

use phf::phf_set;

/// Elements that never have children or a closing tag.
static VOID_TAGS: phf::Set<&'static str> = phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "param", "source", "track", "wbr",
};

/// Elements whose `value` participates in two-way form bindings.
static FORM_CONTROL_TAGS: phf::Set<&'static str> = phf_set! {
    "input", "select", "textarea",
};

/// Check if the tag is a void element (`<input>`, `<br>`, ...).
#[inline]
pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(tag)
}

/// Check if the tag is a form control.
#[inline]
pub fn is_form_control_tag(tag: &str) -> bool {
    FORM_CONTROL_TAGS.contains(tag)
}

/// `<template>` elements hold inert content that is compiled separately.
#[inline]
pub fn is_template_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("template")
}
