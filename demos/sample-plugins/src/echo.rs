use cmdgraph::prelude::*;

/// Replies `pong`, or its arguments joined by spaces.
pub struct Echo {
    words: Vec<String>,
}

impl FromArgs for Echo {
    fn from_args(args: PluginArgs) -> PluginResult<Self> {
        Ok(Self { words: args.args })
    }
}

#[async_trait]
impl Plugin for Echo {
    async fn run(&self) -> PluginResult<Option<Reply>> {
        if self.words.is_empty() {
            return Ok(Some(Reply::message(["pong"])));
        }
        Ok(Some(Reply::message([self.words.join(" ")])))
    }
}

register_plugin! {
    pub static ECHO = PluginDescriptor::of::<Echo>("echo").with_info("Plugin info: <echo>");
}
