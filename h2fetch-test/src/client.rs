use h2fetch::ClientConf;
use h2fetch::Connector;
use h2fetch::DefaultConnector;
use h2fetch::StreamDescriptor;
use h2fetch::Teardown;

/// What one run wrote, and how it ended.
#[derive(Debug)]
pub struct FetchOutput {
    pub result: h2fetch::Result<Teardown>,
    pub diag: String,
    pub body: Vec<u8>,
}

impl FetchOutput {
    pub fn teardown(&self) -> Teardown {
        match &self.result {
            Ok(teardown) => *teardown,
            Err(e) => panic!("run failed: {}", e),
        }
    }

    pub fn diag_lines(&self) -> Vec<&str> {
        self.diag.lines().collect()
    }
}

/// Fetch `uri` with the default connector on a fresh current-thread runtime.
pub fn fetch(uri: &str, conf: ClientConf) -> FetchOutput {
    let connector = DefaultConnector::new(&conf).expect("connector");
    fetch_with(uri, conf, &connector)
}

pub fn fetch_with(uri: &str, conf: ClientConf, connector: &dyn Connector) -> FetchOutput {
    let descriptor = StreamDescriptor::parse(uri).expect("parse");
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    let mut diag = Vec::new();
    let mut body = Vec::new();
    let result = rt.block_on(h2fetch::run(
        descriptor, &conf, connector, &mut diag, &mut body,
    ));
    let output = FetchOutput {
        result,
        diag: String::from_utf8(diag).expect("utf-8"),
        body,
    };
    debug!("fetch {} finished: {:?}", uri, output.result);
    output
}
