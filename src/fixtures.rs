#[cfg(test)]
pub mod test {
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::time::Duration;

    use clap::Command;
    use serde::Deserialize;
    use toml::value::Datetime;

    use crate::flags::{EnumValue, IntValue, IpValue, PortValue};
    use crate::{
        AppConfig, BaseConfig, Field, Layerfig, LayerfigBuilder, LayerfigError, RawValue,
        SearchPath, TextCodec, lens,
    };

    /// A `host:port` pair, given as a table in the file or as text elsewhere.
    #[derive(Deserialize, Debug, Clone, PartialEq)]
    pub struct Endpoint {
        pub host: String,
        pub port: u16,
    }

    impl TextCodec for Endpoint {
        fn unmarshal_text(&mut self, text: &[u8]) -> Result<(), String> {
            let text = std::str::from_utf8(text).map_err(|e| e.to_string())?;
            let (host, port) = text
                .rsplit_once(':')
                .ok_or_else(|| format!("missing port in {text:?}"))?;
            self.port = port
                .parse()
                .map_err(|e| format!("bad port in {text:?}: {e}"))?;
            self.host = host.to_string();
            Ok(())
        }

        fn marshal_text(&self) -> Result<Vec<u8>, String> {
            Ok(format!("{}:{}", self.host, self.port).into_bytes())
        }

        fn assign_native(&mut self, raw: &RawValue) -> bool {
            if !matches!(raw, RawValue::Table(_)) {
                return false;
            }
            match raw.deserialize_into::<Endpoint>("endpoint") {
                Ok(endpoint) => {
                    *self = endpoint;
                    true
                }
                Err(_) => false,
            }
        }
    }

    #[derive(Deserialize, Debug, Clone, PartialEq)]
    pub struct NameValue {
        pub name: String,
        pub value: String,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct TestConfig {
        pub base: BaseConfig,
        pub timeout: IntValue,
        pub name: String,
        pub enabled: bool,
        pub int8: i8,
        pub int16: i16,
        pub int32: i32,
        pub int64: i64,
        pub uint8: u8,
        pub uint64: u64,
        pub float32: f32,
        pub float64: f64,
        pub wait: Duration,
        pub tags: Vec<String>,
        pub ids: Vec<i64>,
        pub token: String,
        pub secret: String,
        pub started: Datetime,
        pub endpoint: Endpoint,
        pub listen: IpValue,
        pub level: EnumValue,
        pub port: PortValue,
        pub pairs: Vec<NameValue>,
    }

    impl Default for TestConfig {
        fn default() -> Self {
            Self {
                base: BaseConfig::default(),
                timeout: IntValue::with_default("timeout", 400, 0, 1000).unwrap(),
                name: "app".into(),
                enabled: false,
                int8: 0,
                int16: 0,
                int32: 0,
                int64: 0,
                uint8: 0,
                uint64: 0,
                float32: 0.0,
                float64: 0.0,
                wait: Duration::from_secs(5),
                tags: Vec::new(),
                ids: Vec::new(),
                token: String::new(),
                secret: String::new(),
                started: "1970-01-01T00:00:00Z".parse().unwrap(),
                endpoint: Endpoint {
                    host: "localhost".into(),
                    port: 8080,
                },
                listen: IpValue::with_default("listen", "0.0.0.0").unwrap(),
                level: EnumValue::with_default("level", "info", &["debug", "info", "warn"])
                    .unwrap(),
                port: PortValue(8080),
                pairs: Vec::new(),
            }
        }
    }

    impl AppConfig for TestConfig {
        fn base(&self) -> &BaseConfig {
            &self.base
        }

        fn base_mut(&mut self) -> &mut BaseConfig {
            &mut self.base
        }
    }

    pub fn command() -> Command {
        Command::new("app")
            .subcommand(Command::new("get"))
            .subcommand(Command::new("set"))
    }

    pub fn fields() -> Vec<Field<TestConfig>> {
        type C = TestConfig;
        vec![
            Field::flag_codec(
                "timeout",
                "get|timeout|t&set|timeout|t, app.timeout, TIMEOUT",
                lens!(C, timeout),
            )
            .doc("Request timeout"),
            Field::primitive("name", "|name|n, app.name, NAME", lens!(C, name)),
            Field::primitive("enabled", "get|enabled|, app.enabled, ENABLED", lens!(C, enabled)),
            Field::primitive("int8", "||none, int.int8, INT8", lens!(C, int8)),
            Field::primitive("int16", "||none, int.int16, INT16", lens!(C, int16)),
            Field::primitive("int32", "||none, int.int32, INT32", lens!(C, int32)),
            Field::primitive("int64", "||none, int.int64, INT64", lens!(C, int64)),
            Field::primitive("uint8", "||none, int.uint8, UINT8", lens!(C, uint8)),
            Field::primitive("uint64", "||none, int.uint64, UINT64", lens!(C, uint64)),
            Field::primitive("float32", "||none, float.float32, FLOAT32", lens!(C, float32)),
            Field::primitive("float64", "||none, float.float64, FLOAT64", lens!(C, float64)),
            Field::primitive("wait", "get|wait|w, app.wait, WAIT", lens!(C, wait)),
            Field::primitive("tags", "get|tag|, app.tags, TAGS", lens!(C, tags)),
            Field::primitive("ids", "||none, app.ids, IDS", lens!(C, ids)),
            Field::primitive("token", "||none, , TOKEN", lens!(C, token)),
            Field::primitive("secret", "||none, app.secret, ", lens!(C, secret)),
            Field::codec("started", "||none, app.started, STARTED", lens!(C, started)),
            Field::codec("endpoint", "||none, server.endpoint, ENDPOINT", lens!(C, endpoint)),
            Field::flag_codec("listen", "get|listen|, server.listen, LISTEN", lens!(C, listen)),
            Field::flag_codec("level", "get|level|, app.level, LEVEL", lens!(C, level)),
            Field::flag_codec("port", "get|port|p, server.port, PORT", lens!(C, port)),
            Field::opaque::<Vec<NameValue>>("pairs", "||custom, custom.pairs, "),
        ]
    }

    /// A builder over every test field, searching only `dir`.
    pub fn builder(dir: &Path) -> LayerfigBuilder<TestConfig> {
        Layerfig::builder::<TestConfig>()
            .app_name("app")
            .search_paths(vec![SearchPath::Path(dir.to_path_buf())])
            .fields(fields())
    }

    /// Extension parser for the `custom.pairs` array of tables.
    pub fn pairs_parser(
        cfg: &mut TestConfig,
        values: &BTreeMap<String, RawValue>,
    ) -> Result<Vec<String>, LayerfigError> {
        let mut done = Vec::new();
        if let Some(raw) = values.get("custom.pairs") {
            cfg.pairs = raw.deserialize_into("custom.pairs")?;
            done.push("custom.pairs".to_string());
        }
        Ok(done)
    }
}
