use pnet::datalink::{dummy, Config, NetworkInterface};
use pnet::packet::ethernet::EthernetPacket;
use pnet::packet::Packet;
use pnet::util::MacAddr;
use sleep_proxy_core::wake::send_frame_with;
use sleep_proxy_protocols::wol::{magic_packet, MAGIC_PACKET_LEN, WAKE_ON_LAN};

use crate::support::{self, MAC};

#[test]
fn ethernet_wake_frame_carries_the_magic_packet() {
    let mut cfg = dummy::Config::default();
    let sent = cfg.read_handle().unwrap();
    let opener = move |i: &NetworkInterface, _: Config| dummy::channel(i, cfg);

    send_frame_with(&support::ethernet_interface(), &MAC, opener).unwrap();

    let frame = sent.recv().unwrap();
    let ethernet = EthernetPacket::new(&frame).unwrap();
    assert_eq!(ethernet.get_destination(), MacAddr::from(MAC));
    assert_eq!(ethernet.get_source(), MacAddr::broadcast());
    assert_eq!(ethernet.get_ethertype(), WAKE_ON_LAN);
    assert_eq!(ethernet.payload().len(), MAGIC_PACKET_LEN);
    assert_eq!(ethernet.payload(), magic_packet(&MAC).as_slice());
}
