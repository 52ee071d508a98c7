pub mod hw;
pub mod raw;
pub mod resolve;
pub mod sw;

/// A kernel event, ready to be combined with [`Opts`][crate::config::Opts]
/// into an attribute block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event(pub(crate) EventConfig);

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct EventConfig {
    pub ty: u32,
    pub config: u64,
    pub config1: u64,
    pub config2: u64,
}

macro_rules! try_from {
    ($ty:ty, $value:ident, $impl: expr) => {
        impl TryFrom<&$ty> for crate::event::Event {
            type Error = std::io::Error;

            fn try_from($value: &$ty) -> std::result::Result<Self, Self::Error> {
                $impl
            }
        }

        impl TryFrom<$ty> for crate::event::Event {
            type Error = std::io::Error;

            fn try_from(value: $ty) -> std::result::Result<Self, Self::Error> {
                (&value).try_into()
            }
        }
    };
}
use try_from;
