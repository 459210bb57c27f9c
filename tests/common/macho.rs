//! Synthetic 64-bit Mach-O image with one class `A`.
//!
//! A single `__TEXT` segment carries `__text` (code) and `__const` (vtable
//! data, typeinfo, name string). Symbols carry the platform's leading
//! underscore. The `__cxxabiv1::__class_type_info` vtable symbol is defined
//! locally at an anchor slot whose first word is deliberately not a valid
//! offset-to-top, so the dump drops it as a vtable candidate while typeinfo
//! dispatch still resolves through it.

#![allow(dead_code)]

const MH_MAGIC_64: u32 = 0xfeed_facf;
const CPU_TYPE_X86_64: u32 = 0x0100_0007;
const MH_EXECUTE: u32 = 2;
const LC_SEGMENT_64: u32 = 0x19;
const LC_SYMTAB: u32 = 0x2;

pub const BASE: u64 = 0x1_0000_0000;
pub const FN_A: u64 = BASE + 0x200;
pub const CLASS_VT: u64 = BASE + 0x210;
pub const VTV_A: u64 = BASE + 0x218;
pub const ZTI_A: u64 = BASE + 0x238;
pub const STR_A: u64 = BASE + 0x250;

pub const CLASS_INFO: &str = "__ZTVN10__cxxabiv117__class_type_infoE";

const TEXT_OFF: usize = 0x200;
const CONST_OFF: usize = 0x210;
const CONST_SIZE: usize = 0x48;
const SYMTAB_OFF: usize = 0x260;

fn name16(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

pub fn build() -> Vec<u8> {
    let mut buf = vec![0u8; SYMTAB_OFF];

    // __const contents
    let word = |buf: &mut [u8], va: u64, value: i64| {
        let off = (va - BASE) as usize;
        buf[off..off + 8].copy_from_slice(&value.to_le_bytes());
    };
    for b in &mut buf[TEXT_OFF..TEXT_OFF + 0x10] {
        *b = 0xc3;
    }
    word(&mut buf, CLASS_VT, -8); // anchor slot; not a vtable head
    // __ZTV1A: [0, &__ZTI1A, A::f, 0]
    word(&mut buf, VTV_A + 0x08, ZTI_A as i64);
    word(&mut buf, VTV_A + 0x10, FN_A as i64);
    // __ZTI1A: [class_info vtable + 0x10, &"1A"]
    word(&mut buf, ZTI_A, (CLASS_VT + 0x10) as i64);
    word(&mut buf, ZTI_A + 0x08, STR_A as i64);
    buf[(STR_A - BASE) as usize..(STR_A - BASE) as usize + 3].copy_from_slice(b"1A\0");

    // symbol table
    let mut strtab = vec![0u8];
    let mut symtab = Vec::new();
    let mut sym = |name: &str, n_sect: u8, value: u64| {
        let n_strx = strtab.len() as u32;
        strtab.extend_from_slice(name.as_bytes());
        strtab.push(0);
        symtab.extend_from_slice(&n_strx.to_le_bytes());
        symtab.push(0x0f); // N_SECT | N_EXT
        symtab.push(n_sect);
        symtab.extend_from_slice(&0u16.to_le_bytes());
        symtab.extend_from_slice(&value.to_le_bytes());
    };
    sym("__ZTV1A", 2, VTV_A);
    sym("__ZTI1A", 2, ZTI_A);
    sym("__ZN1A1fEv", 1, FN_A);
    sym(CLASS_INFO, 2, CLASS_VT);

    let nsyms = 4u32;
    let stroff = SYMTAB_OFF + symtab.len();
    buf.extend_from_slice(&symtab);
    buf.extend_from_slice(&strtab);
    let total = buf.len() as u64;

    // mach_header_64
    let mut header = Vec::with_capacity(32);
    header.extend_from_slice(&MH_MAGIC_64.to_le_bytes());
    header.extend_from_slice(&CPU_TYPE_X86_64.to_le_bytes());
    header.extend_from_slice(&3u32.to_le_bytes()); // cpusubtype
    header.extend_from_slice(&MH_EXECUTE.to_le_bytes());
    header.extend_from_slice(&2u32.to_le_bytes()); // ncmds
    header.extend_from_slice(&(72 + 2 * 80 + 24u32).to_le_bytes()); // sizeofcmds
    header.extend_from_slice(&0u32.to_le_bytes()); // flags
    header.extend_from_slice(&0u32.to_le_bytes()); // reserved
    buf[..32].copy_from_slice(&header);

    // LC_SEGMENT_64 with __text and __const
    let mut seg = Vec::with_capacity(72 + 2 * 80);
    seg.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
    seg.extend_from_slice(&(72 + 2 * 80u32).to_le_bytes());
    seg.extend_from_slice(&name16("__TEXT"));
    seg.extend_from_slice(&BASE.to_le_bytes()); // vmaddr
    seg.extend_from_slice(&0x1000u64.to_le_bytes()); // vmsize
    seg.extend_from_slice(&0u64.to_le_bytes()); // fileoff
    seg.extend_from_slice(&total.to_le_bytes()); // filesize
    seg.extend_from_slice(&7u32.to_le_bytes()); // maxprot
    seg.extend_from_slice(&5u32.to_le_bytes()); // initprot
    seg.extend_from_slice(&2u32.to_le_bytes()); // nsects
    seg.extend_from_slice(&0u32.to_le_bytes()); // flags
    let mut sect = |sectname: &str, addr: u64, size: u64, offset: u32| {
        seg.extend_from_slice(&name16(sectname));
        seg.extend_from_slice(&name16("__TEXT"));
        seg.extend_from_slice(&addr.to_le_bytes());
        seg.extend_from_slice(&size.to_le_bytes());
        seg.extend_from_slice(&offset.to_le_bytes());
        seg.extend_from_slice(&3u32.to_le_bytes()); // align
        seg.extend_from_slice(&0u32.to_le_bytes()); // reloff
        seg.extend_from_slice(&0u32.to_le_bytes()); // nreloc
        seg.extend_from_slice(&0u32.to_le_bytes()); // flags
        seg.extend_from_slice(&[0u8; 12]); // reserved
    };
    sect("__text", BASE + TEXT_OFF as u64, 0x10, TEXT_OFF as u32);
    sect("__const", BASE + CONST_OFF as u64, CONST_SIZE as u64, CONST_OFF as u32);
    buf[32..32 + seg.len()].copy_from_slice(&seg);

    // LC_SYMTAB
    let mut st = Vec::with_capacity(24);
    st.extend_from_slice(&LC_SYMTAB.to_le_bytes());
    st.extend_from_slice(&24u32.to_le_bytes());
    st.extend_from_slice(&(SYMTAB_OFF as u32).to_le_bytes());
    st.extend_from_slice(&nsyms.to_le_bytes());
    st.extend_from_slice(&(stroff as u32).to_le_bytes());
    st.extend_from_slice(&(strtab.len() as u32).to_le_bytes());
    let st_at = 32 + seg.len();
    buf[st_at..st_at + 24].copy_from_slice(&st);

    buf
}

/// Four slices' worth of universal-binary header, enough to be recognized
/// and rejected.
pub fn build_fat_header() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&0xcafe_babeu32.to_be_bytes());
    buf.extend_from_slice(&2u32.to_be_bytes());
    buf.resize(0x40, 0);
    buf
}

/// A 32-bit Mach-O header; parses but fails the 64-bit gate.
pub fn build_macho32_header() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&0xfeed_faceu32.to_le_bytes());
    buf.extend_from_slice(&7u32.to_le_bytes()); // CPU_TYPE_X86
    buf.extend_from_slice(&3u32.to_le_bytes());
    buf.extend_from_slice(&MH_EXECUTE.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // ncmds
    buf.extend_from_slice(&0u32.to_le_bytes()); // sizeofcmds
    buf.extend_from_slice(&0u32.to_le_bytes()); // flags
    buf
}
