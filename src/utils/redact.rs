/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name`                — printed normally via `&self.field_name`
/// - `redact(field_name)`        — `String` field: shows `[empty]` or `[REDACTED]`
/// - `redact_option(field_name)` — `Option<String>` field: shows `None` or `Some("[REDACTED]")`
#[macro_export]
macro_rules! redact_debug {
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, redact_option($field:ident)) => {
        $builder.field(
            stringify!($field),
            &$self.$field.as_ref().map(|_| "[REDACTED]"),
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        $crate::redact_debug!(@field $builder, $self, redact($field));
        $crate::redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, redact_option($field:ident), $($rest:tt)*) => {
        $crate::redact_debug!(@field $builder, $self, redact_option($field));
        $crate::redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        $crate::redact_debug!(@field $builder, $self, $field);
        $crate::redact_debug!(@fields $builder, $self, $($rest)*);
    };

    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                $crate::redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

/// Mask all but the trailing `keep` characters of a secret, for use in
/// MCP pool keys and log lines.
pub fn tail(secret: &str, keep: usize) -> String {
    if secret.len() <= keep {
        return "*".repeat(secret.len());
    }
    let start = secret.len() - keep;
    format!("{}{}", "*".repeat(start), &secret[start..])
}
