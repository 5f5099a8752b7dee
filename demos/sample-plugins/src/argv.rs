use clap::{CommandFactory, Parser};
use cmdgraph::prelude::*;

const UID: &str = "plugin_argv";

/// Flags understood by `plugin_argv`. Anything else is ignored.
#[derive(Parser, Debug, Default, PartialEq, Eq)]
#[command(
    name = UID,
    about = "Shows how a plugin reads its command arguments",
    disable_help_flag = true,
    ignore_errors = true
)]
struct Flags {
    #[arg(short, long)]
    test: bool,

    /// Print this help
    #[arg(short, long)]
    help: bool,
}

/// Reports whether `--test` was given, or prints its usage for `--help`.
pub struct PluginArgv {
    flags: Flags,
}

impl FromArgs for PluginArgv {
    fn from_args(args: PluginArgs) -> PluginResult<Self> {
        let argv = std::iter::once(UID.to_string()).chain(args.args);
        let flags = Flags::try_parse_from(argv).map_err(|e| PluginError::init(UID, e.to_string()))?;
        Ok(Self { flags })
    }
}

#[async_trait]
impl Plugin for PluginArgv {
    async fn run(&self) -> PluginResult<Option<Reply>> {
        if self.flags.help {
            let help = Flags::command().render_help().to_string();
            return Ok(Some(Reply::message([help])));
        }
        Ok(Some(Reply::message([
            format!("Plugin <{UID}> test msg."),
            format!("argv parse {}", self.flags.test),
        ])))
    }
}

register_plugin! {
    pub static PLUGIN_ARGV =
        PluginDescriptor::of::<PluginArgv>(UID).with_info("Plugin info: <plugin_argv>");
}
