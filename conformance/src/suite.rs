//! The standard set of scenarios.

use url::Url;

use crate::config::HarnessConfig;
use crate::reference::Family;
use crate::scenario::Scenario;

pub const BROKEN_PORT: u16 = 8031;
pub const DELAYED_PORT: u16 = 8032;
pub const ENCODING_PORT: u16 = 8033;

/// Every scenario, real sites and fixtures, honouring the `ipv6` and
/// `https` toggles.
pub fn standard_suite(config: &HarnessConfig) -> Result<Vec<Scenario>, url::ParseError> {
    let mut s = vec![];

    s.push(Scenario::resolve(
        "dns_resolve",
        Url::parse("http://pj-test-dns.htcnet.moe")?,
        Family::V4,
    ));
    s.push(Scenario::unresolvable(
        "dns_resolve_not_exist",
        Url::parse("http://no-such-domain.htcnet.moe")?,
    ));

    if config.ipv6 {
        for host in ["pj-test-dns-v6-only.htcnet.moe", "pj-test-dns-v4-v6.htcnet.moe"] {
            s.push(Scenario::resolve(
                format!("dns_resolve_v6 {}", host),
                Url::parse(&format!("http://{}", host))?,
                Family::V6,
            ));
        }
    }

    s.push(
        Scenario::fetch(
            "basic_http www.fudan.edu.cn",
            Url::parse("http://www.fudan.edu.cn/2016/index.html")?,
        )
        .trace("GET /2016/index.html HTTP/1.1")
        .trace("HTTP/1.1 200 OK"),
    );
    s.push(
        Scenario::fetch("basic_http www.xiami.com", Url::parse("http://www.xiami.com")?)
            .length_only()
            .trace("GET / HTTP/1.1")
            .trace("HTTP/1.1 200 OK"),
    );
    s.push(
        Scenario::fetch(
            "http_with_port",
            Url::parse("http://www.urp.fudan.edu.cn:92/eams/login.action")?,
        )
        .length_only(),
    );

    s.extend(fixture_scenarios(&config.fixture_host)?);

    if config.https {
        s.push(Scenario::fetch(
            "simple_https mirrors.tuna.tsinghua.edu.cn",
            Url::parse("https://mirrors.tuna.tsinghua.edu.cn")?,
        ));
        s.push(Scenario::fetch(
            "simple_https RPM-GPG-KEY-CentOS-7",
            Url::parse("https://mirrors.tuna.tsinghua.edu.cn/centos/RPM-GPG-KEY-CentOS-7")?,
        ));
        s.push(Scenario::invalid_certificate(
            "https_with_invalid_cert",
            Url::parse("https://kyfw.12306.cn/otn/")?,
        ));
    }

    if config.ipv6 {
        s.push(Scenario::fetch("ipv6 ftp6.sjtu.edu.cn", Url::parse("http://ftp6.sjtu.edu.cn")?));
        s.push(Scenario::fetch(
            "ipv6 RPM-GPG-KEY-CentOS-7",
            Url::parse("http://ftp6.sjtu.edu.cn/centos/RPM-GPG-KEY-CentOS-7")?,
        ));

        if config.https {
            s.push(Scenario::fetch(
                "ipv6_https mirrors6.tuna.tsinghua.edu.cn",
                Url::parse("https://mirrors6.tuna.tsinghua.edu.cn")?,
            ));
            s.push(Scenario::fetch(
                "ipv6_https RPM-GPG-KEY-CentOS-7",
                Url::parse("https://mirrors6.tuna.tsinghua.edu.cn/centos/RPM-GPG-KEY-CentOS-7")?,
            ));
        }

        // Both A and AAAA records, the v6 address is unreachable.
        s.push(Scenario::fetch(
            "ipv4_ipv6",
            Url::parse("http://pj-test-dns-v4-v6-invalid.htcnet.moe/test")?,
        ));
    }

    Ok(s)
}

/// Scenarios against a brokenbin on `host` at its default ports.
pub fn fixture_scenarios(host: &str) -> Result<Vec<Scenario>, url::ParseError> {
    fixture_scenarios_at(host, BROKEN_PORT, DELAYED_PORT, ENCODING_PORT)
}

/// Scenarios against a brokenbin on `host` at the given ports.
pub fn fixture_scenarios_at(
    host: &str,
    broken: u16,
    delayed: u16,
    encoding: u16,
) -> Result<Vec<Scenario>, url::ParseError> {
    let fixture = |port: u16, n: u8| Url::parse(&format!("http://{}:{}/test/{}", host, port, n));

    let mut s = vec![];

    for n in 0..=8 {
        s.push(Scenario::broken(
            format!("broken_response /test/{}", n),
            fixture(broken, n)?,
        ));
    }

    for n in 10..=12 {
        s.push(Scenario::fetch(
            format!("delayed_response /test/{}", n),
            fixture(delayed, n)?,
        ));
    }

    s.push(Scenario::fetch("chunked_coding /test/20", fixture(encoding, 20)?));
    s.push(
        Scenario::fetch("gzip_coding /test/21", fixture(encoding, 21)?).trace("Content-Encoding: gzip"),
    );
    s.push(Scenario::fetch("gzip_coding /test/22", fixture(encoding, 22)?));

    Ok(s)
}
