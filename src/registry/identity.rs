use rand::Rng;
use rand::seq::SliceRandom;

const USER_AGENTS: [&str; 8] = [
    "docker/24.0.6",
    "docker/23.0.3",
    "docker/20.10.22",
    "docker/19.03.13",
    "containerd/1.6.19",
    "containerd/1.5.13",
    "podman/4.4.1",
    "buildkit/0.11.6",
];

const IP_PREFIXES: [&str; 8] = [
    "10.0.",
    "10.1.",
    "172.16.",
    "172.17.",
    "192.168.0.",
    "192.168.1.",
    "172.20.",
    "172.30.",
];

const REGIONS: [&str; 7] = [
    "us-east",
    "us-west",
    "eu-central",
    "eu-west",
    "ap-south",
    "ap-northeast",
    "sa-east",
];

const HOST_PREFIXES: [&str; 8] = [
    "worker",
    "runner",
    "builder",
    "ci-agent",
    "deployment",
    "node",
    "docker",
    "jenkins",
];

const HOST_DOMAINS: [&str; 8] = [
    "internal.corp",
    "k8s.local",
    "docker.local",
    "ci.internal",
    "build.local",
    "runner.cicd",
    "node.cluster",
    "agent.pool",
];

/// Docker patch versions are re-rolled in `0..DOCKER_PATCH_SPREAD`.
const DOCKER_PATCH_SPREAD: u32 = 15;

/// Synthetic client fields decorating one manifest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
    pub ip: String,
    pub hostname: String,
    pub region: &'static str,
    pub request_id: String,
}

impl ClientIdentity {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            user_agent: random_user_agent(rng),
            ip: random_ip(rng),
            hostname: random_hostname(rng),
            region: pick(rng, &REGIONS),
            request_id: format!("{:016x}", rng.r#gen::<u64>()),
        }
    }

    /// Short human description used in completion notices.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{} ({}) in {} using {}",
            self.hostname, self.ip, self.region, self.user_agent
        )
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, items: &[&'static str]) -> &'static str {
    items.choose(rng).copied().unwrap_or_default()
}

fn random_user_agent<R: Rng + ?Sized>(rng: &mut R) -> String {
    let base = pick(rng, &USER_AGENTS);
    if let Some(version) = base.strip_prefix("docker/") {
        let mut parts = version.split('.');
        if let (Some(major), Some(minor), Some(_patch)) = (parts.next(), parts.next(), parts.next())
        {
            let patch = rng.gen_range(0..DOCKER_PATCH_SPREAD);
            return format!("docker/{}.{}.{}", major, minor, patch);
        }
    }
    base.to_owned()
}

fn random_ip<R: Rng + ?Sized>(rng: &mut R) -> String {
    let prefix = pick(rng, &IP_PREFIXES);
    let known_octets = prefix.matches('.').count();
    if known_octets >= 3 {
        format!("{}{}", prefix, rng.r#gen::<u8>())
    } else {
        format!("{}{}.{}", prefix, rng.r#gen::<u8>(), rng.r#gen::<u8>())
    }
}

fn random_hostname<R: Rng + ?Sized>(rng: &mut R) -> String {
    let prefix = pick(rng, &HOST_PREFIXES);
    let domain = pick(rng, &HOST_DOMAINS);
    format!("{}-{:03}.{}", prefix, rng.gen_range(0..1000_u32), domain)
}
