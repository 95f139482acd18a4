//! `*if="path"`.

use super::{Binding, Marker, UpdateContext};
use crate::changelog::Changelog;
use crate::dom::Locals;
use crate::error::Result;
use crate::fragment::VirtualFragment;
use crate::template::BlueprintId;
use crate::value::Value;

pub(super) fn create(binding: &mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> {
    Ok(Some(Box::new(ConditionalMarker::new(binding.blueprint_arg()?))))
}

/// Renders its blueprint after the anchor while the value is truthy.
///
/// The fragment is instantiated fresh every time the value turns truthy and
/// thrown away when it turns falsy; nothing inside survives a hide.
pub struct ConditionalMarker {
    blueprint: BlueprintId,
    fragment: Option<VirtualFragment>,
}

impl ConditionalMarker {
    pub fn new(blueprint: BlueprintId) -> Self {
        Self {
            blueprint,
            fragment: None,
        }
    }

    pub fn is_shown(&self) -> bool {
        self.fragment.is_some()
    }
}

impl Marker for ConditionalMarker {
    fn update(&mut self, cx: &mut UpdateContext<'_>, value: &Value, _: &Changelog) -> Result<()> {
        match (value.is_truthy(), self.fragment.take()) {
            (true, Some(fragment)) => self.fragment = Some(fragment),
            (true, None) => {
                let fragment = cx.instantiate(self.blueprint, Locals::default())?;
                let anchor = cx.node;
                fragment.insert_after(cx.document(), anchor);
                self.fragment = Some(fragment);
            }
            (false, Some(fragment)) => cx.remove_fragment(fragment),
            (false, None) => {}
        }
        Ok(())
    }
}
