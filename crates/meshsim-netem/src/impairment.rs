use meshsim_common::models::NetworkProfile;

/// Network impairment parameters handed to `tc`.
///
/// All fields are optional; only non-`None` parameters are emitted. An
/// empty config installs nothing, leaving the interface unshaped after the
/// preceding clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImpairmentConfig {
    pub rate_kbit: Option<u64>,
    pub delay_ms: Option<u32>,
    pub jitter_ms: Option<u32>,
    pub loss_percent: Option<f32>,
    /// Override the netem queue `limit` (in packets). When `None` and
    /// `rate_kbit` is set, the limit is derived from the bandwidth-delay
    /// product (~2× BDP) so excess traffic is dropped instead of queued
    /// without bound.
    pub netem_limit: Option<u32>,
}

impl ImpairmentConfig {
    /// Maps a profile onto netem parameters. The offline profile becomes a
    /// plain 100% loss qdisc with no rate or delay shaping.
    pub fn from_profile(profile: &NetworkProfile) -> Self {
        if profile.is_offline() {
            return Self {
                loss_percent: Some(100.0),
                ..Default::default()
            };
        }

        Self {
            rate_kbit: Some(profile.rate_kbit()).filter(|r| *r > 0),
            delay_ms: Some(profile.latency_ms).filter(|d| *d > 0),
            jitter_ms: Some(profile.jitter_ms).filter(|j| *j > 0),
            loss_percent: Some(profile.packet_loss_percent).filter(|l| *l > 0.0),
            netem_limit: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rate_kbit.is_none() && self.delay_ms.is_none() && self.loss_percent.is_none()
    }

    fn queue_limit(&self) -> Option<u32> {
        if let Some(explicit) = self.netem_limit {
            return Some(explicit);
        }
        let rate = self.rate_kbit?;
        // 2 × (rate × rtt) / MTU, minimum 20. One-way delay doubled for RTT.
        let rtt_ms = self.delay_ms.unwrap_or(20) as u64 * 2;
        let bdp_bytes = rate * 1000 / 8 * rtt_ms / 1000;
        let bdp_packets = bdp_bytes / 1400;
        Some(std::cmp::max(bdp_packets as u32 * 2, 20))
    }
}

/// Arguments for `tc` that remove whatever root qdisc is installed.
pub fn clear_args(interface: &str) -> Vec<String> {
    ["qdisc", "del", "dev", interface, "root"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Builds the ordered `tc` invocations that install `config` on `interface`.
///
/// With a rate the layout is an HTB root (`1:`) whose default class `1:1`
/// carries the rate, and a netem child (`10:`) for delay/jitter/loss.
/// Without a rate a single root netem qdisc is enough.
pub fn apply_args(interface: &str, config: &ImpairmentConfig) -> Vec<Vec<String>> {
    if config.is_empty() {
        return Vec::new();
    }

    let base = |rest: &[&str]| -> Vec<String> {
        let mut args: Vec<String> = Vec::with_capacity(rest.len() + 3);
        args.push(rest[0].into());
        args.push(rest[1].into());
        args.push("dev".into());
        args.push(interface.into());
        args.extend(rest[2..].iter().map(|s| s.to_string()));
        args
    };

    let Some(rate) = config.rate_kbit else {
        let mut netem = base(&["qdisc", "add", "root", "netem"]);
        append_netem_params(config, &mut netem);
        return vec![netem];
    };

    let htb_root = base(&["qdisc", "add", "root", "handle", "1:", "htb", "default", "1"]);
    let htb_class = base(&[
        "class",
        "add",
        "parent",
        "1:",
        "classid",
        "1:1",
        "htb",
        "rate",
        &format!("{rate}kbit"),
    ]);
    let mut netem = base(&["qdisc", "add", "parent", "1:1", "handle", "10:", "netem"]);
    if let Some(limit) = config.queue_limit() {
        netem.push("limit".into());
        netem.push(limit.to_string());
    }
    append_netem_params(config, &mut netem);

    vec![htb_root, htb_class, netem]
}

fn append_netem_params(config: &ImpairmentConfig, args: &mut Vec<String>) {
    if let Some(delay) = config.delay_ms {
        args.push("delay".into());
        args.push(format!("{}ms", delay));

        if let Some(jitter) = config.jitter_ms {
            if jitter > 0 {
                args.push(format!("{}ms", jitter));
            }
        }
    }

    if let Some(loss) = config.loss_percent {
        args.push("loss".into());
        args.push(format!("{}%", loss));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, mbps: f64, latency: u32, loss: f32, jitter: u32) -> NetworkProfile {
        NetworkProfile {
            name: name.into(),
            bandwidth_mbps: mbps,
            latency_ms: latency,
            packet_loss_percent: loss,
            jitter_ms: jitter,
        }
    }

    fn joined(cmds: &[Vec<String>]) -> Vec<String> {
        cmds.iter().map(|c| c.join(" ")).collect()
    }

    #[test]
    fn offline_is_total_loss_without_rate() {
        let cfg = ImpairmentConfig::from_profile(&profile("offline", 0.0, 0, 100.0, 0));
        assert_eq!(cfg.rate_kbit, None);
        assert_eq!(cfg.delay_ms, None);

        let cmds = apply_args("eth0", &cfg);
        assert_eq!(
            joined(&cmds),
            vec!["qdisc add dev eth0 root netem loss 100%".to_string()]
        );
    }

    #[test]
    fn shaped_profile_builds_htb_with_netem_child() {
        let cfg = ImpairmentConfig::from_profile(&profile("3g", 5.0, 100, 2.0, 20));
        let cmds = joined(&apply_args("veth0", &cfg));

        assert_eq!(cmds.len(), 3);
        assert_eq!(cmds[0], "qdisc add dev veth0 root handle 1: htb default 1");
        assert_eq!(
            cmds[1],
            "class add dev veth0 parent 1: classid 1:1 htb rate 5000kbit"
        );
        assert!(cmds[2].starts_with("qdisc add dev veth0 parent 1:1 handle 10: netem limit "));
        assert!(cmds[2].ends_with("delay 100ms 20ms loss 2%"));
    }

    #[test]
    fn queue_limit_has_a_floor_and_honours_override() {
        let slow = ImpairmentConfig {
            rate_kbit: Some(100),
            delay_ms: Some(10),
            ..Default::default()
        };
        assert_eq!(slow.queue_limit(), Some(20));

        // 100 Mbit × 200 ms RTT = 2.5 MB ≈ 1785 packets → 3570
        let fast = ImpairmentConfig {
            rate_kbit: Some(100_000),
            delay_ms: Some(100),
            ..Default::default()
        };
        assert_eq!(fast.queue_limit(), Some(3570));

        let pinned = ImpairmentConfig {
            netem_limit: Some(64),
            ..fast
        };
        assert_eq!(pinned.queue_limit(), Some(64));
    }

    #[test]
    fn zero_fields_are_omitted() {
        let cfg = ImpairmentConfig::from_profile(&profile("lan", 0.0, 5, 0.0, 0));
        assert_eq!(
            joined(&apply_args("eth0", &cfg)),
            vec!["qdisc add dev eth0 root netem delay 5ms".to_string()]
        );
    }

    #[test]
    fn empty_config_installs_nothing() {
        let cfg = ImpairmentConfig::from_profile(&profile("raw", 0.0, 0, 0.0, 0));
        assert!(cfg.is_empty());
        assert!(apply_args("eth0", &cfg).is_empty());
    }

    #[test]
    fn clear_removes_root_qdisc() {
        assert_eq!(clear_args("eth0").join(" "), "qdisc del dev eth0 root");
    }
}
