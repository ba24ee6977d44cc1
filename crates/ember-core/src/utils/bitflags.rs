// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A small macro for declaring flag sets backed by an integer.

/// Declares a transparent flag set type with the usual set operations.
///
/// Used for the lifecycle bits of core objects and for clear masks passed to
/// the render system.
#[macro_export]
#[doc(hidden)]
macro_rules! ember_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// No flags set.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Builds a set from raw bits, keeping unknown bits.
            pub const fn from_bits_retain(bits: $ty) -> Self {
                Self { bits }
            }

            /// Raw value of the set.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// `true` when no bit is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// `true` if every flag of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// `true` if at least one flag of `other` is set in `self`.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets the flags of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the flags of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Sets or clears `other` depending on `value`.
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut remaining = self.bits;
                let mut first = true;

                write!(f, "{}(", stringify!($name))?;
                $(
                    if ($flag_value != 0) && (remaining & $flag_value) == $flag_value {
                        if !first {
                            write!(f, " | ")?;
                        }
                        write!(f, "{}", stringify!($flag_name))?;
                        remaining &= !$flag_value;
                        first = false;
                    }
                )*
                if remaining != 0 {
                    if !first {
                        write!(f, " | ")?;
                    }
                    write!(f, "{:#x}", remaining)?;
                    first = false;
                }
                if first {
                    write!(f, "EMPTY")?;
                }
                write!(f, ")")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::ember_bitflags;

    ember_bitflags! {
        pub struct TestFlags: u8 {
            const A = 1 << 0;
            const B = 1 << 1;
            const C = 1 << 2;
        }
    }

    #[test]
    fn test_insert_remove_and_contains() {
        let mut flags = TestFlags::EMPTY;
        assert!(flags.is_empty());

        flags.insert(TestFlags::A | TestFlags::C);
        assert!(flags.contains(TestFlags::A));
        assert!(flags.contains(TestFlags::A | TestFlags::C));
        assert!(!flags.contains(TestFlags::B));
        assert!(flags.intersects(TestFlags::B | TestFlags::C));

        flags.remove(TestFlags::A);
        assert_eq!(flags, TestFlags::C);

        flags.set(TestFlags::B, true);
        flags.set(TestFlags::C, false);
        assert_eq!(flags.bits(), 0b010);
    }

    #[test]
    fn test_debug_output() {
        assert_eq!(format!("{:?}", TestFlags::EMPTY), "TestFlags(EMPTY)");
        assert_eq!(
            format!("{:?}", TestFlags::A | TestFlags::B),
            "TestFlags(A | B)"
        );
        assert_eq!(
            format!("{:?}", TestFlags::from_bits_retain(0b1001)),
            "TestFlags(A | 0x8)"
        );
    }
}
