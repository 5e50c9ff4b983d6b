use nom::number::complete::{be_u16, be_u32};

type NomError<'a> = nom::error::Error<&'a [u8]>;

// the inverter fills registers it doesn't have with 0xFFFF
const U16_NOT_PRESENT: u16 = u16::MAX;

pub struct Utils;

impl Utils {
    // big-endian u16 at offset, None if it runs off the end of input
    pub fn be_u16_at(input: &[u8], offset: usize) -> Option<u16> {
        let rest = input.get(offset..)?;
        be_u16::<_, NomError>(rest).ok().map(|(_, v)| v)
    }

    // as be_u16_at, but also None for the not-present sentinel
    pub fn be_u16_checked_at(input: &[u8], offset: usize) -> Option<u16> {
        Self::be_u16_at(input, offset).filter(|v| *v != U16_NOT_PRESENT)
    }

    pub fn be_u32_at(input: &[u8], offset: usize) -> Option<u32> {
        let rest = input.get(offset..)?;
        be_u32::<_, NomError>(rest).ok().map(|(_, v)| v)
    }

    pub fn be_u16_checked_div(input: &[u8], offset: usize, divisor: f64) -> Option<f64> {
        Self::be_u16_checked_at(input, offset).map(|v| f64::from(v) / divisor)
    }

    pub fn be_u32_div(input: &[u8], offset: usize, divisor: f64) -> Option<f64> {
        Self::be_u32_at(input, offset).map(|v| f64::from(v) / divisor)
    }

    // fixed-width text field, NUL padded on the right
    pub fn nul_padded_str(input: &[u8], start: usize, end: usize) -> Option<String> {
        let bytes = input.get(start..end)?;
        std::str::from_utf8(bytes)
            .ok()
            .map(|s| s.trim_end_matches('\0').to_owned())
    }

    pub fn hex(input: &[u8]) -> String {
        input
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let input = [0x00, 0x96, 0x01, 0x02, 0x03, 0x04];
        assert_eq!(Utils::be_u16_at(&input, 0), Some(150));
        assert_eq!(Utils::be_u32_at(&input, 2), Some(0x01020304));
    }

    #[test]
    fn out_of_bounds_is_none() {
        let input = [0x00, 0x96, 0x01];
        assert_eq!(Utils::be_u16_at(&input, 2), None);
        assert_eq!(Utils::be_u16_at(&input, 10), None);
        assert_eq!(Utils::be_u32_at(&input, 0), None);
    }

    #[test]
    fn sentinel_is_none() {
        let input = [0xff, 0xff];
        assert_eq!(Utils::be_u16_at(&input, 0), Some(65535));
        assert_eq!(Utils::be_u16_checked_at(&input, 0), None);
        assert_eq!(Utils::be_u16_checked_div(&input, 0, 10.0), None);
    }

    #[test]
    fn strips_nul_padding() {
        let input = b"xxNL1234\0\0\0\0";
        assert_eq!(Utils::nul_padded_str(input, 2, 12), Some("NL1234".to_owned()));
        assert_eq!(Utils::nul_padded_str(&[0xc3, 0x28], 0, 2), None);
    }

    #[test]
    fn hex_dump() {
        assert_eq!(Utils::hex(&[0x68, 0x02, 0x40]), "68 02 40");
    }
}
