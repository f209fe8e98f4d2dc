use ihex::Record;

const RECORD_LEN: usize = 16;

/// A block of bytes placed at a flash address.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    pub addr: u32,
    pub data: &'a [u8],
}

/// Intel HEX records for `segments`, in order, ending with `EndOfFile`.
pub fn records(segments: &[Segment<'_>]) -> anyhow::Result<Vec<Record>> {
    let mut out = Vec::new();
    let mut upper: Option<u16> = None;

    for seg in segments {
        let end = seg.addr as u64 + seg.data.len() as u64;
        if end > u32::MAX as u64 + 1 {
            bail!(
                "segment at {:#010x} ({} bytes) exceeds the 32-bit address space",
                seg.addr,
                seg.data.len()
            );
        }

        let mut addr = seg.addr as u64;
        let mut rest = seg.data;
        while !rest.is_empty() {
            let hi = (addr >> 16) as u16;
            let lo = (addr & 0xFFFF) as u16;
            if upper != Some(hi) {
                out.push(Record::ExtendedLinearAddress(hi));
                upper = Some(hi);
            }

            let room = 0x1_0000 - lo as usize;
            let n = rest.len().min(RECORD_LEN).min(room);
            out.push(Record::Data {
                offset: lo,
                value: rest[..n].to_vec(),
            });
            addr += n as u64;
            rest = &rest[n..];
        }
    }

    out.push(Record::EndOfFile);
    Ok(out)
}

pub fn render(segments: &[Segment<'_>]) -> anyhow::Result<String> {
    let records = records(segments)?;
    ihex::create_object_file_representation(&records)
        .map_err(|e| anyhow!("error while creating ihex object: {e}"))
}
