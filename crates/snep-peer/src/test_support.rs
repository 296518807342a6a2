use std::thread::{self, JoinHandle};

use snep_link::{DataLink, LinkListener, MemoryLink, MemoryListener};

/// Parse a hex string, ignoring whitespace.
pub(crate) fn hex(text: &str) -> Vec<u8> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    assert!(digits.len() % 2 == 0, "odd number of hex digits in {text:?}");
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).expect("ascii hex");
            u8::from_str_radix(pair, 16).expect("valid hex digit")
        })
        .collect()
}

/// Receive one PDU, failing the test if the link closed.
pub(crate) fn recv_pdu(link: &mut MemoryLink) -> Vec<u8> {
    link.recv()
        .expect("recv should succeed")
        .expect("link should still be open")
        .to_vec()
}

/// Accept one connection on `listener` and run `script` against it on a
/// separate thread.
pub(crate) fn spawn_peer<F>(listener: MemoryListener, script: F) -> JoinHandle<()>
where
    F: FnOnce(MemoryLink) + Send + 'static,
{
    thread::spawn(move || {
        let link = listener.accept().expect("accept should succeed");
        script(link);
    })
}
