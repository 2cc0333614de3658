//! Helper macro generating domain port error enums.
//!
//! Port errors share one shape: a category variant carrying the adapter's
//! failure detail. The macro derives the `thiserror` plumbing and a
//! snake_case constructor per variant so adapters can write
//! `StoreError::query(err)` instead of spelling the struct variant out.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant {
                    /// Adapter-supplied failure detail.
                    message: String,
                },
            )*
        }

        impl $name {
            ::paste::paste! {
                $(
                    #[doc = concat!("Build [`Self::", stringify!($variant), "`] from a displayable detail.")]
                    pub fn [<$variant:snake>](message: impl ::std::fmt::Display) -> Self {
                        Self::$variant { message: message.to_string() }
                    }
                )*
            }
        }
    };
}

pub(crate) use define_port_error;
