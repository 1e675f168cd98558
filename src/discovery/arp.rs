use super::{DiscoveredDevice, Discovery, Ipv4Cidr};
use crate::error::DiscoveryError;
use pnet::datalink::{self, Channel, NetworkInterface};
use pnet::packet::Packet;
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::util::MacAddr;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const ETHERNET_HEADER_LEN: usize = 14;
const ARP_PACKET_LEN: usize = 28;
const READ_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ArpScanner {
    timeout: Duration,
}

impl ArpScanner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Discovery for ArpScanner {
    fn discover(
        &self,
        range: &Ipv4Cidr,
        interface_name: &str,
    ) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let interface = find_interface(interface_name)?;
        let source_mac = interface
            .mac
            .filter(|mac| *mac != MacAddr::zero())
            .ok_or_else(|| DiscoveryError::NoHardwareAddress(interface.name.clone()))?;
        let source_ip = interface_ipv4(&interface)
            .ok_or_else(|| DiscoveryError::NoIpv4Address(interface.name.clone()))?;

        let channel_config = datalink::Config {
            read_timeout: Some(READ_POLL),
            ..Default::default()
        };
        let (mut tx, mut rx) = match datalink::channel(&interface, channel_config) {
            Ok(Channel::Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => {
                return Err(DiscoveryError::Channel {
                    interface: interface.name.clone(),
                    reason: "unsupported channel type".to_string(),
                });
            }
            Err(error) => {
                return Err(DiscoveryError::Channel {
                    interface: interface.name.clone(),
                    reason: error.to_string(),
                });
            }
        };

        info!(
            range = %range,
            interface = %interface.name,
            timeout_secs = self.timeout.as_secs(),
            "ARP scan started"
        );

        let mut sent = 0usize;
        for target in range.hosts().filter(|target| *target != source_ip) {
            let frame = build_request(source_mac, source_ip, target);
            match tx.send_to(&frame, None) {
                Some(Ok(())) => sent += 1,
                Some(Err(error)) => return Err(DiscoveryError::Send(error)),
                None => {
                    return Err(DiscoveryError::Send(std::io::Error::other(
                        "datalink sender refused the frame",
                    )));
                }
            }
        }
        debug!(sent, "ARP requests sent");

        let deadline = Instant::now() + self.timeout;
        let mut replies = ReplyCollector::new(range);

        while Instant::now() < deadline {
            match rx.next() {
                Ok(frame) => replies.offer(frame),
                Err(error)
                    if matches!(error.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(error) => {
                    warn!(error = %error, "ARP receive failed; keeping replies collected so far");
                    break;
                }
            }
        }

        let devices = replies.into_devices();
        info!(responders = devices.len(), "ARP scan finished");
        Ok(devices)
    }
}

struct ReplyCollector<'a> {
    range: &'a Ipv4Cidr,
    seen: HashSet<String>,
    devices: Vec<DiscoveredDevice>,
}

impl<'a> ReplyCollector<'a> {
    fn new(range: &'a Ipv4Cidr) -> Self {
        Self {
            range,
            seen: HashSet::new(),
            devices: Vec::new(),
        }
    }

    fn offer(&mut self, frame: &[u8]) {
        let Some(device) = parse_reply(frame) else {
            return;
        };
        if self.range.contains(device.ip) && self.seen.insert(device.mac.clone()) {
            debug!(ip = %device.ip, mac = %device.mac, "ARP reply received");
            self.devices.push(device);
        }
    }

    fn into_devices(self) -> Vec<DiscoveredDevice> {
        self.devices
    }
}

pub fn usable_interfaces() -> Vec<(String, Ipv4Addr)> {
    datalink::interfaces()
        .into_iter()
        .filter(|interface| !interface.is_loopback() && interface.mac.is_some())
        .filter_map(|interface| interface_ipv4(&interface).map(|ip| (interface.name, ip)))
        .collect()
}

fn find_interface(name: &str) -> Result<NetworkInterface, DiscoveryError> {
    datalink::interfaces()
        .into_iter()
        .find(|interface| interface.name == name)
        .ok_or_else(|| DiscoveryError::InterfaceNotFound(name.to_string()))
}

fn interface_ipv4(interface: &NetworkInterface) -> Option<Ipv4Addr> {
    interface.ips.iter().find_map(|network| match network.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(_) => None,
    })
}

pub fn build_request(source_mac: MacAddr, source_ip: Ipv4Addr, target: Ipv4Addr) -> Vec<u8> {
    let mut arp_buffer = [0u8; ARP_PACKET_LEN];
    let mut frame = vec![0u8; ETHERNET_HEADER_LEN + ARP_PACKET_LEN];

    if let Some(mut arp) = MutableArpPacket::new(&mut arp_buffer) {
        arp.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp.set_protocol_type(EtherTypes::Ipv4);
        arp.set_hw_addr_len(6);
        arp.set_proto_addr_len(4);
        arp.set_operation(ArpOperations::Request);
        arp.set_sender_hw_addr(source_mac);
        arp.set_sender_proto_addr(source_ip);
        arp.set_target_hw_addr(MacAddr::zero());
        arp.set_target_proto_addr(target);
    }

    if let Some(mut ethernet) = MutableEthernetPacket::new(&mut frame) {
        ethernet.set_destination(MacAddr::broadcast());
        ethernet.set_source(source_mac);
        ethernet.set_ethertype(EtherTypes::Arp);
        ethernet.set_payload(&arp_buffer);
    }

    frame
}

pub fn parse_reply(frame: &[u8]) -> Option<DiscoveredDevice> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp = ArpPacket::new(ethernet.payload())?;
    if arp.get_operation() != ArpOperations::Reply {
        return None;
    }

    Some(DiscoveredDevice {
        ip: arp.get_sender_proto_addr(),
        mac: arp.get_sender_hw_addr().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{ReplyCollector, build_request, parse_reply};
    use crate::discovery::Ipv4Cidr;
    use pnet::packet::Packet;
    use pnet::packet::arp::{ArpOperations, ArpPacket, MutableArpPacket};
    use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
    use pnet::util::MacAddr;
    use std::net::Ipv4Addr;

    const SCANNER_MAC: MacAddr = MacAddr(0x02, 0x00, 0x00, 0x00, 0x00, 0x01);

    fn reply_from(mac: MacAddr, ip: Ipv4Addr) -> Vec<u8> {
        let mut frame = build_request(SCANNER_MAC, Ipv4Addr::new(192, 168, 0, 10), ip);
        let mut arp_buffer = EthernetPacket::new(&frame)
            .expect("ethernet")
            .payload()
            .to_vec();
        {
            let mut arp = MutableArpPacket::new(&mut arp_buffer).expect("arp");
            arp.set_operation(ArpOperations::Reply);
            arp.set_sender_hw_addr(mac);
            arp.set_sender_proto_addr(ip);
        }
        let mut ethernet = MutableEthernetPacket::new(&mut frame).expect("ethernet");
        ethernet.set_source(mac);
        ethernet.set_payload(&arp_buffer);
        frame
    }

    #[test]
    fn request_is_broadcast_who_has() {
        let target = Ipv4Addr::new(192, 168, 0, 42);
        let frame = build_request(SCANNER_MAC, Ipv4Addr::new(192, 168, 0, 10), target);

        let ethernet = EthernetPacket::new(&frame).expect("ethernet");
        assert_eq!(ethernet.get_destination(), MacAddr::broadcast());
        assert_eq!(ethernet.get_ethertype(), EtherTypes::Arp);

        let arp = ArpPacket::new(ethernet.payload()).expect("arp");
        assert_eq!(arp.get_operation(), ArpOperations::Request);
        assert_eq!(arp.get_target_proto_addr(), target);
        assert_eq!(arp.get_sender_hw_addr(), SCANNER_MAC);
    }

    #[test]
    fn reply_yields_sender_address() {
        let mac = MacAddr(0xaa, 0x11, 0x22, 0x33, 0x44, 0x55);
        let frame = reply_from(mac, Ipv4Addr::new(192, 168, 0, 42));

        let device = parse_reply(&frame).expect("reply parsed");

        assert_eq!(device.ip, Ipv4Addr::new(192, 168, 0, 42));
        assert_eq!(device.mac, "aa:11:22:33:44:55");
    }

    #[test]
    fn collector_keeps_first_reply_per_mac_in_arrival_order() {
        let range = "192.168.0.0/24".parse::<Ipv4Cidr>().expect("cidr");
        let phone = MacAddr(0xaa, 0x11, 0x22, 0x33, 0x44, 0x55);
        let laptop = MacAddr(0xbb, 0x11, 0x22, 0x33, 0x44, 0x66);
        let mut replies = ReplyCollector::new(&range);

        replies.offer(&reply_from(laptop, Ipv4Addr::new(192, 168, 0, 30)));
        replies.offer(&reply_from(phone, Ipv4Addr::new(192, 168, 0, 20)));
        replies.offer(&reply_from(laptop, Ipv4Addr::new(192, 168, 0, 31)));
        replies.offer(&reply_from(phone, Ipv4Addr::new(192, 168, 0, 20)));

        let devices = replies.into_devices();
        let seen = devices
            .iter()
            .map(|device| (device.ip, device.mac.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            seen,
            vec![
                (Ipv4Addr::new(192, 168, 0, 30), "bb:11:22:33:44:66"),
                (Ipv4Addr::new(192, 168, 0, 20), "aa:11:22:33:44:55"),
            ]
        );
    }

    #[test]
    fn collector_drops_out_of_range_replies_and_requests() {
        let range = "192.168.0.0/24".parse::<Ipv4Cidr>().expect("cidr");
        let stranger = MacAddr(0xcc, 0x11, 0x22, 0x33, 0x44, 0x77);
        let mut replies = ReplyCollector::new(&range);

        replies.offer(&reply_from(stranger, Ipv4Addr::new(10, 0, 0, 5)));
        replies.offer(&build_request(
            SCANNER_MAC,
            Ipv4Addr::new(192, 168, 0, 10),
            Ipv4Addr::new(192, 168, 0, 42),
        ));
        replies.offer(&[0u8; 6]);

        assert!(replies.into_devices().is_empty());
    }

    #[test]
    fn requests_and_truncated_frames_are_ignored() {
        let request = build_request(
            SCANNER_MAC,
            Ipv4Addr::new(192, 168, 0, 10),
            Ipv4Addr::new(192, 168, 0, 42),
        );

        assert!(parse_reply(&request).is_none());
        assert!(parse_reply(&request[..10]).is_none());
    }
}
