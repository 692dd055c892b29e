//! Subnet association.
//!
//! Declared subnets come from configuration; addresses outside every
//! declared range get a synthesized subnet (default /24) that joins the
//! table and is reused for every later address it contains. The table
//! only grows during a scan.

use std::net::IpAddr;

use ipnet::IpNet;

pub struct SubnetTable {
    subnets: Vec<IpNet>,
    synthesized_prefix_len: u8,
}

impl SubnetTable {
    pub fn new(declared: Vec<IpNet>, synthesized_prefix_len: u8) -> Self {
        Self {
            subnets: declared,
            synthesized_prefix_len,
        }
    }

    /// Non-synthesizing lookup: the first known subnet containing the
    /// address. Used for router association, which never grows the table.
    pub fn find(&self, ip: IpAddr) -> Option<IpNet> {
        self.subnets.iter().copied().find(|net| net.contains(&ip))
    }

    /// Find the containing subnet, synthesizing one around the address
    /// when nothing matches.
    pub fn resolve(&mut self, ip: IpAddr) -> IpNet {
        if let Some(net) = self.find(ip) {
            return net;
        }

        let prefix_len = self.synthesized_prefix_len.min(max_prefix_len(ip));
        let net = IpNet::new(ip, prefix_len)
            .expect("prefix length clamped to address family")
            .trunc();
        tracing::debug!(ip = %ip, subnet = %net, "Synthesized subnet for undeclared address");
        self.subnets.push(net);
        net
    }

    pub fn all(&self) -> &[IpNet] {
        &self.subnets
    }
}

fn max_prefix_len(ip: IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}
