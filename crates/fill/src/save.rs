//! Save descriptors: which fields the platform should watch to offer saving
//! newly typed credentials.

use serde::Serialize;

use crate::device::DeviceProfile;
use crate::field::{FieldDescriptor, FieldId};

pub const SAVE_DATA_TYPE_GENERIC: u32 = 0x0;
pub const SAVE_DATA_TYPE_PASSWORD: u32 = 0x1;
pub const SAVE_DATA_TYPE_USERNAME: u32 = 0x8;

/// Prompt for saving once every watched field has left the screen.
pub const FLAG_SAVE_ON_ALL_VIEWS_INVISIBLE: u32 = 0x1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveDescriptor {
    pub field_ids: Vec<FieldId>,
    /// Bitmask of `SAVE_DATA_TYPE_*`.
    pub save_type: u32,
    pub flags: u32,
}

impl SaveDescriptor {
    pub fn is_valid(&self) -> bool {
        !self.field_ids.is_empty() && self.field_ids.iter().all(|id| !id.is_blank())
    }

    pub fn watches_password(&self) -> bool {
        self.save_type & SAVE_DATA_TYPE_PASSWORD != 0
    }
}

/// Describe what to save for this request, or `None` when the form has no
/// username or password field worth watching.
pub fn build_save_descriptor(
    fields: &[FieldDescriptor],
    device: &DeviceProfile,
) -> Option<SaveDescriptor> {
    let username = fields.iter().find(|f| f.hint.is_username_like());
    let password = fields.iter().find(|f| f.hint.is_password_like());

    let save_type = match (username, password) {
        (Some(_), Some(_)) => SAVE_DATA_TYPE_USERNAME | SAVE_DATA_TYPE_PASSWORD,
        (Some(_), None) => SAVE_DATA_TYPE_USERNAME,
        (None, Some(_)) => SAVE_DATA_TYPE_PASSWORD,
        (None, None) => SAVE_DATA_TYPE_GENERIC,
    };

    let field_ids: Vec<FieldId> = username
        .into_iter()
        .chain(password)
        .map(|f| f.id.clone())
        .collect();

    let descriptor = SaveDescriptor {
        field_ids,
        save_type,
        flags: device.recommended_save_flags(),
    };

    if !descriptor.is_valid() {
        tracing::debug!(
            category = "filling",
            fields = fields.len(),
            "no savable fields in request"
        );
        return None;
    }

    tracing::debug!(
        category = "filling",
        watched = descriptor.field_ids.len(),
        save_type = descriptor.save_type,
        flags = descriptor.flags,
        rom = %device.rom,
        "save descriptor built"
    );
    Some(descriptor)
}
