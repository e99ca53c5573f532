//! # Autofill Response Builder (`fill`)
//!
//! Turns ranked match candidates into the platform's fill response and
//! decides which fields to watch for saving.
//!
//! - [`ResponseBuilder`] maps each candidate onto the request's
//!   [`FieldDescriptor`]s. Candidates that fail are reported in
//!   [`BuildResult::errors`] while the rest still produce [`FillUnit`]s.
//! - [`build_save_descriptor`] picks the username and password fields to
//!   watch, with flags tuned to the device ROM.
//! - [`DeviceProfile`] detects the manufacturer and ROM from build facts and
//!   carries per-ROM quirks (save flags, timeout, retries, inline support).
//!
//! ```
//! use fill::{FieldDescriptor, FieldHint, ResponseBuilder};
//! use matcher::CredentialEntry;
//!
//! let entries = vec![
//!     CredentialEntry::new(1, "GitHub").with_username("octocat").with_password("hunter2"),
//! ];
//! let fields = vec![
//!     FieldDescriptor::new("login", FieldHint::Username),
//!     FieldDescriptor::new("secret", FieldHint::Password),
//! ];
//!
//! let result = ResponseBuilder::default().build(&entries, &fields, 0, false);
//! assert!(result.is_success());
//! assert_eq!(result.succeeded, 1);
//! ```

pub mod builder;
pub mod device;
pub mod field;
pub mod save;

pub use builder::{
    BuildError, BuildResult, BuildStats, FillPlatform, FillResponse, FillUnit, PickerContext,
    PickerPresenter, ResponseBuilder, StandardPlatform, NO_USERNAME_PLACEHOLDER,
};
pub use device::{
    BuildInfo, DeviceProfile, DeviceProfileProvider, Manufacturer, RomFamily,
    StaticDeviceProvider,
};
pub use field::{value_for_hint, FieldDescriptor, FieldHint, FieldId};
pub use save::{
    build_save_descriptor, SaveDescriptor, FLAG_SAVE_ON_ALL_VIEWS_INVISIBLE,
    SAVE_DATA_TYPE_GENERIC, SAVE_DATA_TYPE_PASSWORD, SAVE_DATA_TYPE_USERNAME,
};
