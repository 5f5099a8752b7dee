//! Link-time plugin registration.

// ─── register_plugin! ────────────────────────────────────────────────────────

/// Declares a `static` [`PluginDescriptor`](crate::plugin::PluginDescriptor)
/// and adds it to [`PLUGIN_REGISTRY`](crate::plugin::PLUGIN_REGISTRY).
///
/// The descriptor becomes visible to
/// [`BuiltinRegistry`](crate::plugin::BuiltinRegistry) as soon as the
/// declaring crate is linked into the binary.
///
/// ```rust,ignore
/// register_plugin! {
///     /// Replies "pong".
///     pub static ECHO = PluginDescriptor::of::<Echo>("echo").with_info("Replies pong");
/// }
/// ```
#[macro_export]
macro_rules! register_plugin {
    ($(#[$meta:meta])* $vis:vis static $name:ident = $descriptor:expr $(;)?) => {
        $(#[$meta])*
        #[$crate::linkme::distributed_slice($crate::plugin::PLUGIN_REGISTRY)]
        #[linkme(crate = $crate::linkme)]
        $vis static $name: $crate::plugin::PluginDescriptor = $descriptor;
    };
}
