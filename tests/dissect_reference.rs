//! Frames built with etherparse must dissect to the values they were built from.

use etherparse::{PacketBuilder, SlicedPacket, TransportSlice};
use fanout_watch::monitor::parsers::{
    dissect_ethernet, dissect_frame, dissect_icmp, dissect_ipv4, dissect_tcp, dissect_udp, Dissected,
    Transport, IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP,
};
use fanout_watch::FlowKey;

const SRC_MAC: [u8; 6] = [0x02, 0x42, 0xac, 0x11, 0x00, 0x02];
const DST_MAC: [u8; 6] = [0xf0, 0x9f, 0xc2, 0x0a, 0x1b, 0xee];

fn tcp_frame(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
        .ipv4(src, dst, 64)
        .tcp(src_port, dst_port, 1000, 64240)
        .syn();
    let mut frame = Vec::with_capacity(builder.size(0));
    builder.write(&mut frame, &[]).unwrap();
    frame
}

#[test]
fn tcp_frame_layers() {
    let frame = tcp_frame([172, 17, 0, 2], [10, 1, 2, 3], 51515, 8443);

    let (dst_mac, src_mac, ethertype, ip) = dissect_ethernet(&frame).unwrap();
    assert_eq!(dst_mac, "F09FC20A1BEE");
    assert_eq!(src_mac, "0242AC110002");
    assert_eq!(ethertype, 0x0800);

    let (protocol, src_ip, dst_ip, transport) = dissect_ipv4(ip).unwrap();
    assert_eq!(protocol, IPPROTO_TCP);
    assert_eq!(src_ip, "172.17.0.2");
    assert_eq!(dst_ip, "10.1.2.3");

    assert_eq!(dissect_tcp(transport).unwrap(), (51515, 8443));
}

#[test]
fn udp_frame_layers() {
    let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
        .ipv4([192, 168, 0, 10], [8, 8, 8, 8], 64)
        .udp(53000, 53);
    let payload = [0xde, 0xad, 0xbe, 0xef];
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, &payload).unwrap();

    let (_, _, _, ip) = dissect_ethernet(&frame).unwrap();
    let (protocol, src_ip, dst_ip, transport) = dissect_ipv4(ip).unwrap();
    assert_eq!(protocol, IPPROTO_UDP);
    assert_eq!((src_ip.as_str(), dst_ip.as_str()), ("192.168.0.10", "8.8.8.8"));
    assert_eq!(dissect_udp(transport).unwrap(), (53000, 53));

    assert_eq!(
        dissect_frame(&frame).unwrap().flow_key(),
        Some(FlowKey::new("192.168.0.10", "8.8.8.8", 53))
    );
}

#[test]
fn icmp_frame_is_dissected_but_not_tracked() {
    let builder = PacketBuilder::ethernet2(SRC_MAC, DST_MAC)
        .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
        .icmpv4_echo_request(7, 1);
    let mut frame = Vec::with_capacity(builder.size(0));
    builder.write(&mut frame, &[]).unwrap();

    let (_, _, _, ip) = dissect_ethernet(&frame).unwrap();
    let (protocol, _, _, transport) = dissect_ipv4(ip).unwrap();
    assert_eq!(protocol, IPPROTO_ICMP);
    assert_eq!(dissect_icmp(transport).unwrap(), (8, 0));

    let dissected = dissect_frame(&frame).unwrap();
    assert!(matches!(dissected, Dissected::Ipv4 { transport: Transport::Icmp(_), .. }));
    assert_eq!(dissected.flow_key(), None);
}

#[test]
fn ports_agree_with_etherparse() {
    for (sp, dp) in [(1u16, 1u16), (80, 65535), (40000, 22), (65535, 0)] {
        let frame = tcp_frame([10, 9, 8, 7], [1, 2, 3, 4], sp, dp);

        let reference = SlicedPacket::from_ethernet(&frame).unwrap();
        let Some(TransportSlice::Tcp(tcp)) = reference.transport else {
            panic!("etherparse did not see TCP");
        };

        let key = dissect_frame(&frame).unwrap().flow_key().unwrap();
        assert_eq!(key.dst_port, tcp.destination_port());
        assert_eq!(key.src_ip, "10.9.8.7");
    }
}

#[test]
fn truncated_frames_never_panic() {
    let frame = tcp_frame([10, 0, 0, 5], [10, 0, 0, 1], 1234, 80);
    for len in 0..38 {
        assert!(dissect_frame(&frame[..len]).is_err(), "prefix of {} bytes", len);
    }
    assert!(dissect_frame(&frame[..38]).is_ok());
}
