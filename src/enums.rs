use thiserror::Error;

/// A `TEXT` column held a value no enum variant maps to.
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares an enum stored as lowercase `TEXT`, with serde names matching
/// the column values and `TryFrom<String>` for `#[sqlx(try_from = "String")]`.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::enums::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::enums::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::enums::UnknownVariant;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

pub(crate) use text_enum;

#[cfg(test)]
mod tests {
    text_enum! {
        enum Weather {
            Sunny => "sunny",
            Rainy => "rainy",
        }
    }

    #[test]
    fn text_round_trip_and_unknown() {
        assert_eq!("rainy".parse::<Weather>().unwrap(), Weather::Rainy);
        assert_eq!(Weather::Sunny.to_string(), "sunny");
        let err = Weather::try_from("hail".to_string()).unwrap_err();
        assert_eq!(err.kind, "Weather");
        assert!(err.to_string().contains("hail"));
        assert_eq!(serde_json::to_string(&Weather::Sunny).unwrap(), "\"sunny\"");
        assert_eq!(Weather::ALL.len(), 2);
    }
}
