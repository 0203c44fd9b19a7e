//! # Named Facades
//!
//! Independent consumers embedded in one process each get their own session
//! identity, task table and completion slot by instantiating
//! [`SessionManager`] with a different namespace. A namespace is a marker type
//! carrying its name, its event prefix and its own process-wide instance cell.
//!
//! ```rust
//! background_upload::session_namespace!(
//!     /// Uploads owned by the media picker
//!     pub MediaUpload, "MediaUpload", "MediaUpload"
//! );
//!
//! use background_upload::session::SessionNamespace;
//! assert_eq!(MediaUpload::NAME, "MediaUpload");
//! ```

use super::manager::SessionManager;
use std::sync::OnceLock;

pub trait SessionNamespace: Sized + Send + Sync + 'static {
    /// Session identity suffix, unique per process
    const NAME: &'static str;
    /// Prefix of emitted event names, `<prefix>-progress`
    const EVENT_PREFIX: &'static str;

    /// Cell holding the process-wide manager of this namespace
    fn instance() -> &'static OnceLock<SessionManager<Self>>;
}

/// Declare a namespace marker type with its own process-wide manager cell.
#[macro_export]
macro_rules! session_namespace {
    ($(#[$meta:meta])* $vis:vis $name:ident, $label:expr, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $name;

        impl $crate::session::SessionNamespace for $name {
            const NAME: &'static str = $label;
            const EVENT_PREFIX: &'static str = $prefix;

            fn instance() -> &'static ::std::sync::OnceLock<$crate::session::SessionManager<Self>> {
                static INSTANCE: ::std::sync::OnceLock<$crate::session::SessionManager<$name>> =
                    ::std::sync::OnceLock::new();
                &INSTANCE
            }
        }
    };
}

session_namespace!(
    /// Primary upload service
    pub BgUpload, "BGUpload", "BGUpload"
);

session_namespace!(
    /// Secondary consumer sharing the process with [`BgUpload`]
    pub ShadowUpload, "ShadowUpload", "ShadowUpload"
);

session_namespace!(
    /// Upload service of the Hightro integration
    pub HightroUpload, "HightroSession", "HightroUploadService"
);

pub type BgUploadManager = SessionManager<BgUpload>;
pub type ShadowUploadManager = SessionManager<ShadowUpload>;
pub type HightroSessionManager = SessionManager<HightroUpload>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_names_are_distinct() {
        assert_ne!(BgUpload::NAME, ShadowUpload::NAME);
        assert_ne!(BgUpload::NAME, HightroUpload::NAME);
        assert_eq!(HightroUpload::EVENT_PREFIX, "HightroUploadService");
    }

    #[test]
    fn test_instance_cells_are_distinct() {
        let bg = BgUpload::instance() as *const _ as *const ();
        let shadow = ShadowUpload::instance() as *const _ as *const ();
        assert_ne!(bg, shadow);
    }
}
