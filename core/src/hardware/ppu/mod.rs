use itertools::Itertools;
use num_integer::Integer;

use crate::hardware::ppu::cgb_vram::CgbTileMap;
use crate::hardware::ppu::Mode::{HBlank, LcdTransfer, OamSearch, VBlank};
use crate::hardware::ppu::palette::{CgbPalette, Palette, PaletteIndex};
use crate::hardware::ppu::register_flags::*;
use crate::hardware::ppu::tiledata::*;
use crate::hardware::GameBoyModel;
use crate::io::interrupts::InterruptFlags;

pub const RESOLUTION_WIDTH: usize = 160;
pub const RESOLUTION_HEIGHT: usize = 144;
pub const FRAMEBUFFER_SIZE: usize = RESOLUTION_HEIGHT * RESOLUTION_WIDTH;

/// One M-cycle worth of T-states; the PPU's internal `current_cycles`
/// accumulator advances in these units regardless of CPU speed.
const CYCLES_PER_FRAME: u32 = 70224;

pub const LCD_CONTROL_REGISTER: u16 = 0xFF40;
pub const LCD_STATUS_REGISTER: u16 = 0xFF41;
pub const SCY_REGISTER: u16 = 0xFF42;
pub const SCX_REGISTER: u16 = 0xFF43;
pub const LY_REGISTER: u16 = 0xFF44;
pub const LYC_REGISTER: u16 = 0xFF45;
pub const WY_REGISTER: u16 = 0xFF4A;
pub const WX_REGISTER: u16 = 0xFF4B;
pub const BG_PALETTE: u16 = 0xFF47;
pub const OB_PALETTE_0: u16 = 0xFF48;
pub const OB_PALETTE_1: u16 = 0xFF49;
/// Writing here launches an OAM DMA transfer from `value << 8` to FE00-FE9F.
pub const DMA_TRANSFER: u16 = 0xFF46;

pub mod cgb_ppu;
pub mod cgb_vram;
pub mod memory_binds;
pub mod palette;
pub mod register_flags;
pub mod tiledata;

// Misc:
// If the Window is enabled while drawing the screen (LY is between 0 and 143)
// then if it is disabled by changing the Bit 5 in LCDC, the Game Boy "remembers"
// what line it was last rendering from the Window.
// If the Window, once disabled, is again enabled before VBlank,
// it starts drawing the Window from the last line it "remembers".

#[derive(Debug, PartialOrd, PartialEq, Copy, Clone)]
pub enum Mode {
    HBlank,
    VBlank,
    OamSearch,
    LcdTransfer,
}

pub struct PPU {
    emulated_model: GameBoyModel,

    /// DMG canonical output: one post-BGP/OBP 2-bit shade (0-3) per pixel.
    dmg_frame_buffer: [u8; FRAMEBUFFER_SIZE],
    /// CGB canonical output: one packed xRGB1555 colour per pixel.
    cgb_frame_buffer: [u16; FRAMEBUFFER_SIZE],

    scanline_buffer: [u8; RESOLUTION_WIDTH],
    cgb_scanline_buffer: [u16; RESOLUTION_WIDTH],
    /// Raw (pre-palette) colour index and BG-to-OAM priority bit per pixel of
    /// the current CGB scanline, needed to resolve sprite-vs-background
    /// priority without unmapping the already-paletted colour.
    scanline_buffer_unpalette: [(u8, bool); RESOLUTION_WIDTH],

    tiles: [Tile; 768],
    tile_map_9800: TileMap,
    tile_map_9c00: TileMap,
    cgb_9800_tile_map: CgbTileMap,
    cgb_9c00_tile_map: CgbTileMap,
    oam: [SpriteAttribute; 40],

    lcd_control: LcdControl,
    lcd_status: LcdStatus,

    bg_window_palette: Palette,
    oam_palette_0: Palette,
    oam_palette_1: Palette,

    cgb_bg_palette: [CgbPalette; 8],
    cgb_sprite_palette: [CgbPalette; 8],
    cgb_bg_palette_ind: PaletteIndex,
    cgb_sprite_palette_ind: PaletteIndex,
    tile_bank_currently_used: u8,
    cgb_object_priority: bool,

    lyc_compare: u8,
    current_y: u8,
    scroll_x: u8,
    scroll_y: u8,
    window_x: u8,
    window_y: u8,
    window_counter: u8,
    window_triggered: bool,
    current_cycles: u32,
    vblank_cycles: u32,
    stat_irq_triggered: bool,
    oam_transfer_ongoing: bool,
}

impl PPU {
    pub fn new(emulated_model: GameBoyModel) -> Self {
        PPU {
            emulated_model,
            dmg_frame_buffer: [0; FRAMEBUFFER_SIZE],
            cgb_frame_buffer: [0; FRAMEBUFFER_SIZE],
            scanline_buffer: [0; RESOLUTION_WIDTH],
            cgb_scanline_buffer: [0; RESOLUTION_WIDTH],
            scanline_buffer_unpalette: [(0, false); RESOLUTION_WIDTH],
            tiles: [Tile::default(); 768],
            tile_map_9800: TileMap::new(),
            tile_map_9c00: TileMap::new(),
            cgb_9800_tile_map: CgbTileMap::new(),
            cgb_9c00_tile_map: CgbTileMap::new(),
            oam: [SpriteAttribute::default(); 40],
            lcd_control: LcdControl::from_bits_truncate(0b1001_0011),
            lcd_status: Default::default(),
            bg_window_palette: Palette::default(),
            oam_palette_0: Palette::default(),
            oam_palette_1: Palette::default(),
            cgb_bg_palette: Default::default(),
            cgb_sprite_palette: Default::default(),
            cgb_bg_palette_ind: Default::default(),
            cgb_sprite_palette_ind: Default::default(),
            tile_bank_currently_used: 0,
            cgb_object_priority: false,
            lyc_compare: 0,
            current_y: 0,
            scroll_x: 0,
            scroll_y: 0,
            window_x: 0,
            window_y: 0,
            window_counter: 0,
            window_triggered: false,
            current_cycles: 0,
            vblank_cycles: 0,
            stat_irq_triggered: false,
            oam_transfer_ongoing: false,
        }
    }

    /// Run the PPU and potentially render a scanline/advance state depending
    /// on the passed `cpu_clock_increment`.
    ///
    /// # Returns
    ///
    /// Any interrupts that may have occurred during this `do_cycle`.
    pub fn do_cycle(&mut self, cpu_clock_increment: u32) -> Option<InterruptFlags> {
        self.current_cycles += cpu_clock_increment;

        if !self.lcd_control.contains(LcdControl::LCD_DISPLAY) {
            return None;
        }

        let mut pending_interrupts = InterruptFlags::empty();

        // Everything but V-Blank, 144*456
        if self.current_cycles < 65664 {
            let local_cycles = self.current_cycles % 456;

            if local_cycles < 80 {
                // Searching objects (Mode 2)
                if self.lcd_status.mode_flag() != OamSearch {
                    if self.lcd_status.mode_flag() != VBlank {
                        self.ly_lyc_compare(&mut pending_interrupts);
                    }

                    self.lcd_status.set_mode_flag(Mode::OamSearch);
                    if self.lcd_status.contains(LcdStatus::MODE_2_OAM_INTERRUPT) {
                        pending_interrupts.insert(InterruptFlags::LCD_STAT);
                    }
                }
            } else if local_cycles < 252 {
                // Drawing (Mode 3)
                if self.lcd_status.mode_flag() != LcdTransfer {
                    self.lcd_status.set_mode_flag(LcdTransfer);
                    self.render_scanline();
                }
            } else {
                // H-Blank for the remainder of the line.
                if self.lcd_status.mode_flag() != HBlank {
                    self.lcd_status.set_mode_flag(HBlank);

                    if self.lcd_status.contains(LcdStatus::MODE_0_H_INTERRUPT) {
                        pending_interrupts.insert(InterruptFlags::LCD_STAT);
                    }
                }
            }
        } else {
            // V-Blank
            if self.lcd_status.mode_flag() != VBlank {
                self.lcd_status.set_mode_flag(VBlank);

                self.ly_lyc_compare(&mut pending_interrupts);

                self.vblank_cycles = self.current_cycles - 65664;
                self.window_counter = 0;
                self.window_triggered = false;

                if self.lcd_status.contains(LcdStatus::MODE_1_V_INTERRUPT) {
                    pending_interrupts.insert(InterruptFlags::LCD_STAT);
                }

                pending_interrupts.insert(InterruptFlags::VBLANK);
            } else if self.current_cycles < CYCLES_PER_FRAME {
                self.vblank_cycles += cpu_clock_increment;
                if self.vblank_cycles >= 456 {
                    self.vblank_cycles -= 456;

                    if self.current_y == 154 {
                        self.current_cycles -= CYCLES_PER_FRAME;
                        self.current_y = 0;
                        self.ly_lyc_compare(&mut pending_interrupts);
                    } else {
                        self.current_y = self.current_y.wrapping_add(1);
                        self.ly_lyc_compare(&mut pending_interrupts);
                    }
                }
            } else {
                self.current_cycles -= CYCLES_PER_FRAME;
                self.current_y = 0;
                self.ly_lyc_compare(&mut pending_interrupts);
            }
        }

        if !pending_interrupts.is_empty() { Some(pending_interrupts) } else { None }
    }

    fn render_scanline(&mut self) {
        if self.current_y == self.window_y {
            self.window_triggered = true;
        }

        if self.emulated_model.is_cgb() {
            self.draw_cgb_scanline();
            let current_address = self.current_y as usize * RESOLUTION_WIDTH;
            self.cgb_frame_buffer[current_address..current_address + RESOLUTION_WIDTH]
                .copy_from_slice(&self.cgb_scanline_buffer);
        } else {
            self.draw_scanline();
            let current_address = self.current_y as usize * RESOLUTION_WIDTH;
            self.dmg_frame_buffer[current_address..current_address + RESOLUTION_WIDTH]
                .copy_from_slice(&self.scanline_buffer);
        }

        self.current_y = self.current_y.wrapping_add(1);
    }

    fn draw_scanline(&mut self) {
        if self.lcd_control.contains(LcdControl::BG_WINDOW_PRIORITY) {
            self.draw_bg_scanline();

            if self.lcd_control.contains(LcdControl::WINDOW_DISPLAY) {
                self.draw_window_scanline();
            }
        } else {
            let bgcolour = self.bg_window_palette.color_0();
            for pixel in self.scanline_buffer.iter_mut() {
                *pixel = bgcolour;
            }
        }

        if self.lcd_control.contains(LcdControl::SPRITE_DISPLAY_ENABLE) {
            self.draw_sprite_scanline();
        }
    }

    fn draw_bg_scanline(&mut self) {
        let scanline_to_be_rendered = self.current_y.wrapping_add(self.scroll_y);
        let tile_lower_bound = ((scanline_to_be_rendered / 8) as u16 * 32) + (self.scroll_x / 8) as u16;
        // 20 since 20*8 = 160 pixels
        let mut tile_higher_bound = tile_lower_bound + 20;

        let tile_line_y = scanline_to_be_rendered % 8;
        let mut pixel_counter: usize = 0;
        let mut x_remainder = (self.scroll_x % 8) as i8;

        if x_remainder != 0 {
            tile_higher_bound += 1;
        }

        for mut i in tile_lower_bound..tile_higher_bound {
            if (self.scroll_x as u16 + pixel_counter as u16) > 255 {
                i -= 32;
            }
            let mut tile_relative_address = self.get_tile_address_bg(i % BACKGROUND_TILE_SIZE as u16) as usize;

            if !self.lcd_control.contains(LcdControl::BG_WINDOW_TILE_SELECT) {
                tile_relative_address = (tile_relative_address as i8) as usize;
            }

            let offset: usize = if self.lcd_control.bg_window_tile_address() == TILE_BLOCK_0_START { 0 } else { 256 };
            let tile_address: usize = offset.wrapping_add(tile_relative_address);

            let tile: Tile = self.tiles[tile_address];

            let (top_pixel_data, bottom_pixel_data) = tile.get_pixel_line(tile_line_y);

            self.bg_window_render_pixels(&mut pixel_counter, &mut x_remainder, top_pixel_data, bottom_pixel_data);
        }
    }

    fn draw_window_scanline(&mut self) {
        let window_x = self.window_x.wrapping_sub(7);
        if self.current_y < self.window_y || window_x >= 160 {
            return;
        }

        let tile_lower_bound = (self.window_counter / 8) as u16 * 32;
        let tile_higher_bound = (tile_lower_bound + (160 - window_x as u16).div_ceil(&8)) as u16;

        let tile_pixel_y = self.current_y % 8;
        let mut pixel_counter = window_x as usize;
        let mut x_remainder = (window_x % 8) as i8;
        self.window_counter += 1;

        for i in tile_lower_bound..tile_higher_bound {
            let mut tile_relative_address = self.get_tile_address_window(i) as usize;

            if self.lcd_control.bg_window_tile_address() == TILE_BLOCK_1_START {
                tile_relative_address = (tile_relative_address as i8) as usize;
            }

            let offset: usize = if self.lcd_control.bg_window_tile_address() == TILE_BLOCK_0_START { 0 } else { 256 };
            let tile_address: usize = offset.wrapping_add(tile_relative_address);

            let tile: Tile = self.tiles[tile_address];

            let (top_pixel_data, bottom_pixel_data) = tile.get_pixel_line(tile_pixel_y);

            self.bg_window_render_pixels(&mut pixel_counter, &mut x_remainder, top_pixel_data, bottom_pixel_data);
        }
    }

    fn draw_sprite_scanline(&mut self) {
        let tall_sprites = self.lcd_control.contains(LcdControl::SPRITE_SIZE);
        let y_size: u8 = if tall_sprites { 16 } else { 8 };

        let sprites_to_draw = self
            .oam
            .iter()
            .filter(|sprite| {
                let screen_y_pos = sprite.y_pos as i16 - 16;
                is_sprite_on_scanline(self.current_y as i16, screen_y_pos, y_size as i16)
            })
            .take(10)
            .sorted_by_key(|x| x.x_pos)
            .rev();

        for sprite in sprites_to_draw {
            let screen_x_pos = sprite.x_pos as i16 - 8;
            let screen_y_pos = sprite.y_pos as i16 - 16;

            let x_flip = sprite.attribute_flags.contains(AttributeFlags::X_FLIP);
            let y_flip = sprite.attribute_flags.contains(AttributeFlags::Y_FLIP);
            let is_background_sprite = sprite.attribute_flags.contains(AttributeFlags::OBJ_TO_BG_PRIORITY);

            let mut line = (self.current_y as i16 - screen_y_pos) as u8;

            if y_flip {
                line = y_size - (line + 1);
            }

            let tile_index = sprite.tile_number as usize;
            let tile = if !tall_sprites {
                self.tiles[tile_index]
            } else if line < 8 {
                self.tiles[tile_index & 0xFE]
            } else {
                self.tiles[tile_index | 0x01]
            };

            let (top_pixel_data, bottom_pixel_data) = tile.get_pixel_line(line % 8);

            for j in 0..=7 {
                let pixel = if x_flip { screen_x_pos + j } else { screen_x_pos + (7 - j) };

                if (pixel < 0)
                    || (pixel > 159)
                    || (is_background_sprite && self.scanline_buffer[pixel as usize] != self.bg_window_palette.color_0())
                {
                    continue;
                }

                let colour = self.get_pixel_colour(j as u8, top_pixel_data, bottom_pixel_data, self.get_sprite_palette(sprite));

                if colour != self.get_sprite_palette(sprite).color_0() {
                    self.scanline_buffer[pixel as usize] = colour;
                }
            }
        }
    }

    fn bg_window_render_pixels(&mut self, pixel_counter: &mut usize, x_remainder: &mut i8, top_pixel_data: u8, bottom_pixel_data: u8) {
        for j in (0..=7).rev() {
            if *x_remainder > 0 || *pixel_counter > 159 {
                *x_remainder -= 1;
                continue;
            }

            self.scanline_buffer[*pixel_counter] = self.get_pixel_colour(j, top_pixel_data, bottom_pixel_data, self.bg_window_palette);

            *pixel_counter += 1;
        }
    }

    fn get_pixel_colour(&self, bit_offset: u8, top_pixel_data: u8, bottom_pixel_data: u8, palette: Palette) -> u8 {
        let bit1 = (top_pixel_data & (0x1 << bit_offset)) >> bit_offset;
        let bit2 = (bottom_pixel_data & (0x1 << bit_offset)) >> bit_offset;
        let current_pixel = bit1 | (bit2 << 1);

        palette.color(current_pixel)
    }

    fn get_sprite_palette(&self, sprite: &SpriteAttribute) -> Palette {
        if !sprite.attribute_flags.contains(AttributeFlags::PALETTE_NUMBER) {
            self.oam_palette_0
        } else {
            self.oam_palette_1
        }
    }

    fn get_tile_address_bg(&self, address: u16) -> u8 {
        if !self.lcd_control.contains(LcdControl::BG_TILE_MAP_SELECT) {
            self.tile_map_9800.data[address as usize]
        } else {
            self.tile_map_9c00.data[address as usize]
        }
    }

    fn get_tile_address_window(&self, address: u16) -> u8 {
        if !self.lcd_control.contains(LcdControl::WINDOW_MAP_SELECT) {
            self.tile_map_9800.data[address as usize]
        } else {
            self.tile_map_9c00.data[address as usize]
        }
    }

    fn ly_lyc_compare(&mut self, pending_interrupts: &mut InterruptFlags) {
        if self.current_y == self.lyc_compare {
            self.lcd_status.set(LcdStatus::COINCIDENCE_FLAG, true);
            if self.lcd_status.contains(LcdStatus::COINCIDENCE_INTERRUPT) {
                pending_interrupts.set(InterruptFlags::LCD_STAT, true);
            }
        } else {
            self.lcd_status.set(LcdStatus::COINCIDENCE_FLAG, false);
        }
    }

    pub fn dmg_frame_buffer(&self) -> &[u8; FRAMEBUFFER_SIZE] {
        &self.dmg_frame_buffer
    }

    pub fn cgb_frame_buffer(&self) -> &[u16; FRAMEBUFFER_SIZE] {
        &self.cgb_frame_buffer
    }

    pub fn current_line(&self) -> u8 {
        self.current_y
    }
}

pub(crate) fn is_sprite_on_scanline(scanline_y: i16, y_pos: i16, y_size: i16) -> bool {
    (scanline_y >= y_pos) && (scanline_y < (y_pos + y_size))
}
