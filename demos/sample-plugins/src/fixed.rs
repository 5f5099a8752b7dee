use cmdgraph::prelude::*;

const UID: &str = "plugin_2";

/// Replies with one fixed line; `params.text` overrides it.
pub struct Fixed {
    text: String,
}

impl FromArgs for Fixed {
    fn from_args(args: PluginArgs) -> PluginResult<Self> {
        let text = args
            .param_str("text")
            .map_or_else(|| format!("Plugin <{UID}> test msg."), str::to_string);
        Ok(Self { text })
    }
}

#[async_trait]
impl Plugin for Fixed {
    async fn run(&self) -> PluginResult<Option<Reply>> {
        debug!(plugin = UID, "Sending fixed message");
        Ok(Some(Reply::message([self.text.clone()])))
    }
}

register_plugin! {
    pub static PLUGIN_2 = PluginDescriptor::of::<Fixed>(UID).with_info("Plugin info: <plugin_2>");
}
