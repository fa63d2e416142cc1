//! Native enum tables
//!
//! The native engine identifies call conventions, attribute kinds and
//! attribute positions by plain integers. The tables here translate between
//! those codes and typed enums in both directions. Each table is generated by
//! `native_enum!`, which also checks at compile time that no two variants
//! share a code and that every code lies inside the engine's range.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A numeric code coming back from the native engine that no table entry maps
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown native {enum_name} code {code}")]
pub struct UnknownNativeEnum {
    pub enum_name: &'static str,
    pub code: u32,
}

macro_rules! native_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident : $max:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal => $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Largest code the native engine defines for this enum
            pub const NATIVE_MAX: u32 = $max;

            pub const fn to_native(self) -> u32 {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            pub fn from_native(code: u32) -> Result<Self, UnknownNativeEnum> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(UnknownNativeEnum { enum_name: stringify!($name), code }),
                }
            }

            /// Spelling used in textual IR
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        const _: () = {
            let codes: &[u32] = &[$($code),+];
            let mut i = 0;
            while i < codes.len() {
                assert!(codes[i] <= $max, concat!(stringify!($name), " code outside the native range"));
                let mut j = i + 1;
                while j < codes.len() {
                    assert!(codes[i] != codes[j], concat!("duplicate native code in ", stringify!($name)));
                    j += 1;
                }
                i += 1;
            }
        };

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

native_enum! {
    /// Calling conventions understood by the native engine
    pub enum CallConvention : 1023 {
        C = 0 => "ccc",
        Fast = 8 => "fastcc",
        Cold = 9 => "coldcc",
        Ghc = 10 => "ghccc",
        HiPE = 11 => "cc 11",
        AnyReg = 13 => "anyregcc",
        PreserveMost = 14 => "preserve_mostcc",
        PreserveAll = 15 => "preserve_allcc",
        Swift = 16 => "swiftcc",
        CxxFastTls = 17 => "cxx_fast_tlscc",
        Tail = 18 => "tailcc",
        X86StdCall = 64 => "x86_stdcallcc",
        X86FastCall = 65 => "x86_fastcallcc",
        ArmApcs = 66 => "arm_apcscc",
        ArmAapcs = 67 => "arm_aapcscc",
        ArmAapcsVfp = 68 => "arm_aapcs_vfpcc",
        X86ThisCall = 70 => "x86_thiscallcc",
        X86_64SysV = 78 => "x86_64_sysvcc",
        Win64 = 79 => "win64cc",
        X86VectorCall = 80 => "x86_vectorcallcc",
    }
}

impl Default for CallConvention {
    fn default() -> Self {
        CallConvention::C
    }
}

native_enum! {
    /// Well-known enumerated attributes
    pub enum AttributeKind : 127 {
        AlwaysInline = 1 => "alwaysinline",
        ByVal = 2 => "byval",
        Cold = 3 => "cold",
        Convergent = 4 => "convergent",
        Hot = 5 => "hot",
        InlineHint = 6 => "inlinehint",
        InReg = 7 => "inreg",
        MinSize = 8 => "minsize",
        Naked = 9 => "naked",
        Nest = 10 => "nest",
        NoAlias = 11 => "noalias",
        NoBuiltin = 12 => "nobuiltin",
        NoCapture = 13 => "nocapture",
        NoInline = 14 => "noinline",
        NonNull = 15 => "nonnull",
        NoRecurse = 16 => "norecurse",
        NoReturn = 17 => "noreturn",
        NoUnwind = 18 => "nounwind",
        OptimizeForSize = 19 => "optsize",
        OptimizeNone = 20 => "optnone",
        ReadNone = 21 => "readnone",
        ReadOnly = 22 => "readonly",
        Returned = 23 => "returned",
        SignExt = 24 => "signext",
        StructRet = 25 => "sret",
        UwTable = 26 => "uwtable",
        WriteOnly = 27 => "writeonly",
        ZeroExt = 28 => "zeroext",
        Alignment = 29 => "align",
        Dereferenceable = 30 => "dereferenceable",
        StackAlignment = 31 => "alignstack",
        NoUndef = 32 => "noundef",
    }
}

/// Where an enumerated attribute may legally be attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributePlacement {
    /// Function index only
    Function,
    /// Parameter indices only
    Parameter,
    /// Return value or parameters
    Value,
    /// Function index or parameters
    FunctionOrParameter,
}

impl AttributeKind {
    pub fn placement(self) -> AttributePlacement {
        use AttributeKind::*;
        match self {
            AlwaysInline | Cold | Convergent | Hot | InlineHint | MinSize | Naked | NoBuiltin
            | NoInline | NoRecurse | NoReturn | NoUnwind | OptimizeForSize | OptimizeNone
            | UwTable | StackAlignment => AttributePlacement::Function,
            ByVal | Nest | NoCapture | Returned | StructRet => AttributePlacement::Parameter,
            InReg | NoAlias | NonNull | SignExt | ZeroExt | Alignment | Dereferenceable
            | NoUndef => AttributePlacement::Value,
            ReadNone | ReadOnly | WriteOnly => AttributePlacement::FunctionOrParameter,
        }
    }

    pub fn is_valid_at(self, index: AttributeIndex) -> bool {
        match (self.placement(), index) {
            (AttributePlacement::Function, AttributeIndex::Function) => true,
            (AttributePlacement::Parameter, AttributeIndex::Param(_)) => true,
            (AttributePlacement::Value, AttributeIndex::Return | AttributeIndex::Param(_)) => true,
            (AttributePlacement::FunctionOrParameter, AttributeIndex::Function | AttributeIndex::Param(_)) => true,
            _ => false,
        }
    }

    /// Attributes that carry an integer payload (`align 8`, `dereferenceable 16`)
    pub fn takes_value(self) -> bool {
        matches!(
            self,
            AttributeKind::Alignment | AttributeKind::Dereferenceable | AttributeKind::StackAlignment
        )
    }
}

/// Attachment point of an attribute on a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeIndex {
    Return,
    Param(u32),
    Function,
}

impl fmt::Display for AttributeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeIndex::Return => write!(f, "return"),
            AttributeIndex::Param(index) => write!(f, "param {index}"),
            AttributeIndex::Function => write!(f, "function"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_convention_table_is_bidirectional() {
        for &cc in CallConvention::ALL {
            assert_eq!(CallConvention::from_native(cc.to_native()), Ok(cc));
        }
        for &kind in AttributeKind::ALL {
            assert_eq!(AttributeKind::from_native(kind.to_native()), Ok(kind));
        }
    }

    #[test]
    fn test_unknown_code_is_an_error() {
        let err = CallConvention::from_native(12).unwrap_err();
        assert_eq!(err, UnknownNativeEnum { enum_name: "CallConvention", code: 12 });
        assert_eq!(err.to_string(), "unknown native CallConvention code 12");
        assert!(AttributeKind::from_native(0).is_err());
    }

    #[test]
    fn test_textual_spelling() {
        assert_eq!(CallConvention::Fast.to_string(), "fastcc");
        assert_eq!(CallConvention::default(), CallConvention::C);
        assert_eq!(AttributeKind::StructRet.as_str(), "sret");
    }

    #[test]
    fn test_placement_rules() {
        assert!(AttributeKind::NoReturn.is_valid_at(AttributeIndex::Function));
        assert!(!AttributeKind::NoReturn.is_valid_at(AttributeIndex::Param(0)));
        assert!(AttributeKind::ZeroExt.is_valid_at(AttributeIndex::Return));
        assert!(!AttributeKind::ZeroExt.is_valid_at(AttributeIndex::Function));
        assert!(AttributeKind::StructRet.is_valid_at(AttributeIndex::Param(1)));
        assert!(!AttributeKind::StructRet.is_valid_at(AttributeIndex::Return));
        assert!(AttributeKind::ReadOnly.is_valid_at(AttributeIndex::Function));
        assert!(AttributeKind::Alignment.takes_value());
        assert!(!AttributeKind::Cold.takes_value());
    }
}
