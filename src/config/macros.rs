/// Configuration macros
///
/// `config_struct!` declares a configuration section once: field, type,
/// default and an optional lower bound.

/// Define a configuration section with embedded defaults
///
/// Generates the struct with public fields, `Default`, serde support with
/// `#[serde(default)]` (a partial TOML table only overrides the keys it
/// names) and `check_bounds`, which rejects values under a field's
/// `=> min` bound.
///
/// # Example
/// ```
/// challengebot::config_struct! {
///     pub struct MonitorConfig {
///         interval_secs: u64 = 5 => min 1,
///         concurrency: usize = 8 => min 1,
///         label: String = "monitor".to_string(),
///     }
/// }
///
/// let config = MonitorConfig { interval_secs: 0, ..Default::default() };
/// assert!(config.check_bounds().is_err());
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr $(=> min $min:expr)?
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }

        impl $name {
            /// First field below its declared minimum, as an error message
            pub fn check_bounds(&self) -> Result<(), String> {
                $(
                    $(
                        if self.$field_name < $min {
                            return Err(format!(
                                "{}.{} = {} is below the minimum {}",
                                stringify!($name),
                                stringify!($field_name),
                                self.$field_name,
                                $min
                            ));
                        }
                    )?
                )*
                Ok(())
            }
        }
    };
}
