//! Modelos del sistema
//!
//! Este módulo contiene los modelos de dominio: vehículos, listados externos,
//! configuración de tarifas, órdenes, pagos y registros de actividad.

/// Enum persistido como TEXT: `as_str`, `Display` y `FromStr`
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

pub mod activity;
pub mod auth;
pub mod fee_settings;
pub mod listing;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod profile;
pub mod vehicle;
